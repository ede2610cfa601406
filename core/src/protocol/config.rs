//! Node configuration

use std::fmt;
use std::path::PathBuf;

use crate::cache::DEFAULT_CAPACITY_BYTES;

/// Configuration for a skiff node
#[derive(Clone)]
pub struct NodeConfig {
    /// Maximum bytes of blob data held in the content cache.
    /// Default: 256 MB
    pub cache_capacity_bytes: u64,

    /// Where to mount the filesystem bridge.
    /// If None, the node runs without a mount (protocol-only).
    pub mount_path: Option<PathBuf>,

    /// Timeout for establishing a connection to a peer (seconds).
    /// Default: 10
    pub connect_timeout_secs: u64,

    /// Timeout for a single peer's response to a file request, and for
    /// draining a broadcast send (seconds).
    /// Default: 10
    pub request_timeout_secs: u64,

    /// Fixed secret key for the endpoint identity (32 bytes).
    /// If None, a random key is generated on start.
    pub secret_key: Option<[u8; 32]>,
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("cache_capacity_bytes", &self.cache_capacity_bytes)
            .field("mount_path", &self.mount_path)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            cache_capacity_bytes: DEFAULT_CAPACITY_BYTES,
            mount_path: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 10,
            secret_key: None,
        }
    }
}

impl NodeConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache capacity in bytes
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity_bytes = bytes;
        self
    }

    /// Set the mount path for the filesystem bridge
    pub fn with_mount_path(mut self, path: PathBuf) -> Self {
        self.mount_path = Some(path);
        self
    }

    /// Set the peer connect timeout
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Set the per-peer response timeout
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set a fixed endpoint secret key
    pub fn with_secret_key(mut self, key: [u8; 32]) -> Self {
        self.secret_key = Some(key);
        self
    }

    /// Configuration for testing (small cache, short timeouts, no mount)
    pub fn for_testing() -> Self {
        Self {
            cache_capacity_bytes: 10 * 1024 * 1024, // 10 MB
            mount_path: None,
            connect_timeout_secs: 5,
            request_timeout_secs: 5,
            secret_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.cache_capacity_bytes, 256 * 1024 * 1024);
        assert_eq!(config.mount_path, None);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.request_timeout_secs, 10);
        assert!(config.secret_key.is_none());
    }

    #[test]
    fn test_new_equals_default() {
        let config1 = NodeConfig::new();
        let config2 = NodeConfig::default();
        assert_eq!(config1.cache_capacity_bytes, config2.cache_capacity_bytes);
        assert_eq!(config1.connect_timeout_secs, config2.connect_timeout_secs);
    }

    #[test]
    fn test_builder_chain() {
        let config = NodeConfig::new()
            .with_cache_capacity(1024)
            .with_mount_path(PathBuf::from("/mnt/skiff"))
            .with_connect_timeout(3)
            .with_request_timeout(7)
            .with_secret_key([42u8; 32]);

        assert_eq!(config.cache_capacity_bytes, 1024);
        assert_eq!(config.mount_path, Some(PathBuf::from("/mnt/skiff")));
        assert_eq!(config.connect_timeout_secs, 3);
        assert_eq!(config.request_timeout_secs, 7);
        assert_eq!(config.secret_key, Some([42u8; 32]));
    }

    #[test]
    fn test_testing_config() {
        let config = NodeConfig::for_testing();
        assert_eq!(config.cache_capacity_bytes, 10 * 1024 * 1024);
        assert!(config.mount_path.is_none());
        assert!(config.connect_timeout_secs <= 5);
    }

    #[test]
    fn test_debug_redacts_secret_key() {
        let config = NodeConfig::new().with_secret_key([0xABu8; 32]);
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("171")); // 0xAB = 171 must not appear
    }

    #[test]
    fn test_debug_shows_none_for_missing_key() {
        let config = NodeConfig::new();
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("secret_key: None"));
    }
}
