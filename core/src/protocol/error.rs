//! Node errors

use crate::network::ExchangeError;

/// Errors that can occur on a node
#[derive(Debug)]
pub enum NodeError {
    /// Failed to start the node
    StartFailed(String),
    /// Network error
    Network(String),
    /// Requested name absent locally and unobtainable from any peer
    NotFound(String),
    /// Invalid input provided
    InvalidInput(String),
    /// Failed to mount the filesystem bridge
    Mount(String),
    /// IO error
    Io(String),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeError::StartFailed(e) => write!(f, "failed to start node: {}", e),
            NodeError::Network(e) => write!(f, "network error: {}", e),
            NodeError::NotFound(name) => write!(f, "not found: {}", name),
            NodeError::InvalidInput(e) => write!(f, "invalid input: {}", e),
            NodeError::Mount(e) => write!(f, "mount failed: {}", e),
            NodeError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::Io(e.to_string())
    }
}

impl NodeError {
    /// Map an exchange failure for `name` into a node error.
    pub(crate) fn from_exchange(e: ExchangeError, name: &str) -> Self {
        match e {
            ExchangeError::NotFound | ExchangeError::Timeout => {
                NodeError::NotFound(name.to_string())
            }
            ExchangeError::Transport(msg) => NodeError::Network(msg),
            ExchangeError::InvalidName(_) => NodeError::InvalidInput(name.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_error_display() {
        let err = NodeError::StartFailed("no endpoint".to_string());
        assert_eq!(err.to_string(), "failed to start node: no endpoint");

        let err = NodeError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "network error: connection refused");

        let err = NodeError::NotFound("notes.txt".to_string());
        assert_eq!(err.to_string(), "not found: notes.txt");

        let err = NodeError::InvalidInput("empty name".to_string());
        assert_eq!(err.to_string(), "invalid input: empty name");

        let err = NodeError::Mount("no fuse device".to_string());
        assert_eq!(err.to_string(), "mount failed: no fuse device");
    }

    #[test]
    fn test_node_error_is_error_trait() {
        let err: Box<dyn std::error::Error> = Box::new(NodeError::NotFound("x".to_string()));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_from_exchange_maps_terminal_failures_to_not_found() {
        let err = NodeError::from_exchange(ExchangeError::NotFound, "k");
        assert!(matches!(err, NodeError::NotFound(_)));

        let err = NodeError::from_exchange(ExchangeError::Timeout, "k");
        assert!(matches!(err, NodeError::NotFound(_)));

        let err = NodeError::from_exchange(ExchangeError::Transport("reset".into()), "k");
        assert!(matches!(err, NodeError::Network(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: NodeError = io.into();
        assert!(matches!(err, NodeError::Io(_)));
    }
}
