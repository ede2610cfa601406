//! Exchange service
//!
//! Core service struct for the peer file-exchange protocol. The
//! implementation is split across:
//! - `service.rs` (this file): struct, constructors, error type
//! - `outgoing.rs`: client side (request a file, broadcast a file)
//! - `incoming.rs`: handlers for inbound request/broadcast connections

use std::sync::Arc;
use std::time::Duration;

use iroh::Endpoint;

use crate::cache::ContentCache;
use crate::network::roster::PeerRoster;

use super::protocol::WireError;

/// Peer file-exchange service.
///
/// Serves cache hits to requesting peers, fetches cache misses from peers,
/// and propagates local writes to all connected peers. Owns handles to the
/// one cache and one roster of its node.
pub struct ExchangeService {
    /// Iroh endpoint for outgoing connections. `None` only in test-only
    /// instances that never touch the network.
    endpoint: Option<Endpoint>,
    /// Shared content cache.
    cache: Arc<ContentCache>,
    /// Shared peer roster.
    roster: Arc<PeerRoster>,
    /// Timeout for establishing a connection to a peer.
    connect_timeout: Duration,
    /// Timeout for reading a single peer's response.
    request_timeout: Duration,
}

impl ExchangeService {
    /// Create a fully-wired exchange service.
    pub fn new(
        endpoint: Endpoint,
        cache: Arc<ContentCache>,
        roster: Arc<PeerRoster>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            endpoint: Some(endpoint),
            cache,
            roster,
            connect_timeout,
            request_timeout,
        }
    }

    /// Create a service with no endpoint, for tests that never dial out.
    pub fn for_testing(cache: Arc<ContentCache>, roster: Arc<PeerRoster>) -> Self {
        Self {
            endpoint: None,
            cache,
            roster,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(2),
        }
    }

    pub(super) fn endpoint(&self) -> &Endpoint {
        self.endpoint
            .as_ref()
            .expect("ExchangeService: endpoint not set (test-only instance?)")
    }

    /// The cache this service serves from and fills into.
    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// The roster this service walks for requests and broadcasts.
    pub fn roster(&self) -> &Arc<PeerRoster> {
        &self.roster
    }

    pub(super) fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub(super) fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Exchange protocol error.
#[derive(Debug)]
pub enum ExchangeError {
    /// Name absent locally and unobtainable from any peer (empty roster, or
    /// every attempt returned empty, timed out, or failed).
    NotFound,
    /// A single peer attempt exceeded its deadline.
    Timeout,
    /// Stream open/read/write failure against one peer.
    Transport(String),
    /// Name is not valid on the wire.
    InvalidName(String),
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeError::NotFound => write!(f, "file not found on any peer"),
            ExchangeError::Timeout => write!(f, "peer request timed out"),
            ExchangeError::Transport(e) => write!(f, "transport error: {}", e),
            ExchangeError::InvalidName(name) => write!(f, "invalid content name: {:?}", name),
        }
    }
}

impl std::error::Error for ExchangeError {}

impl From<WireError> for ExchangeError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::InvalidName => ExchangeError::InvalidName(String::new()),
            other => ExchangeError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_error_display() {
        assert_eq!(
            ExchangeError::NotFound.to_string(),
            "file not found on any peer"
        );
        assert_eq!(ExchangeError::Timeout.to_string(), "peer request timed out");
        assert_eq!(
            ExchangeError::Transport("reset".to_string()).to_string(),
            "transport error: reset"
        );
        assert!(ExchangeError::InvalidName("a\nb".to_string())
            .to_string()
            .contains("invalid content name"));
    }

    #[test]
    fn test_test_instance_exposes_shared_state() {
        let cache = Arc::new(ContentCache::new(1024));
        let roster = Arc::new(PeerRoster::new());
        let service = ExchangeService::for_testing(cache.clone(), roster.clone());

        service.cache().put("k", b"v".to_vec());
        assert_eq!(cache.get("k"), Some(b"v".to_vec()));
        assert!(service.roster().is_empty());
    }
}
