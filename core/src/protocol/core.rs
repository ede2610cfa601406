//! Main Node implementation
//!
//! The Node owns the content cache, the peer roster, and the exchange
//! service, and registers the stream handlers for the two protocol message
//! kinds. Implementation is split across:
//! - `protocol/` (this module): Node struct, start/stop, public methods
//! - `handlers/`: the inbound connection accept loop
//! - `network/exchange/`: the wire protocol itself

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use iroh::{Endpoint, EndpointAddr, EndpointId, SecretKey};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::cache::ContentCache;
use crate::fs;
use crate::network::exchange::{ExchangeService, FILE_BROADCAST_ALPN, FILE_REQUEST_ALPN};
use crate::network::roster::PeerRoster;

use super::config::NodeConfig;
use super::error::NodeError;

/// A node in the peer-assisted content cache.
///
/// This is the main entry point: start a node, hand discovered peers to
/// [`Node::handle_peer_found`], and either use [`Node::mount`] to expose the
/// cache as a filesystem or drive it through the cache/exchange API.
pub struct Node {
    /// Configuration
    config: NodeConfig,
    /// Iroh endpoint
    endpoint: Endpoint,
    /// Content cache (exclusively owned by this node, shared by handle)
    cache: Arc<ContentCache>,
    /// Peer roster
    roster: Arc<PeerRoster>,
    /// Exchange protocol service
    exchange: Arc<ExchangeService>,
    /// Running flag
    running: Arc<RwLock<bool>>,
    /// Background tasks
    tasks: Arc<RwLock<Vec<tokio::task::JoinHandle<()>>>>,
}

impl Node {
    /// Start a node.
    ///
    /// Binds an endpoint advertising both exchange ALPNs and spawns the
    /// inbound connection handler.
    pub async fn start(config: NodeConfig) -> Result<Self, NodeError> {
        let secret_key = match config.secret_key {
            Some(bytes) => SecretKey::from_bytes(&bytes),
            None => {
                use rand::{rngs::OsRng, Rng};
                let mut key = [0u8; 32];
                OsRng.fill(&mut key);
                SecretKey::from_bytes(&key)
            }
        };

        let endpoint = Endpoint::builder()
            .secret_key(secret_key)
            .alpns(vec![
                FILE_REQUEST_ALPN.to_vec(),
                FILE_BROADCAST_ALPN.to_vec(),
            ])
            .bind()
            .await
            .map_err(|e| NodeError::StartFailed(format!("failed to create endpoint: {}", e)))?;

        info!(
            endpoint_id = %endpoint.id(),
            cache_capacity = config.cache_capacity_bytes,
            "node started"
        );

        let cache = Arc::new(ContentCache::new(config.cache_capacity_bytes));
        let roster = Arc::new(PeerRoster::new());
        let exchange = Arc::new(ExchangeService::new(
            endpoint.clone(),
            cache.clone(),
            roster.clone(),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        ));

        let node = Self {
            config,
            endpoint,
            cache,
            roster,
            exchange,
            running: Arc::new(RwLock::new(true)),
            tasks: Arc::new(RwLock::new(Vec::new())),
        };

        node.start_background_tasks().await;

        Ok(node)
    }

    /// Start background tasks (currently just the inbound handler).
    async fn start_background_tasks(&self) {
        let mut tasks = self.tasks.write().await;

        let endpoint = self.endpoint.clone();
        let exchange = self.exchange.clone();
        let roster = self.roster.clone();
        let running = self.running.clone();

        let incoming_task = tokio::spawn(async move {
            Self::run_incoming_handler(endpoint, exchange, roster, running).await;
        });
        tasks.push(incoming_task);
    }

    /// Stop the node.
    pub async fn stop(&self) {
        info!("stopping node...");

        {
            let mut running = self.running.write().await;
            *running = false;
        }

        {
            let mut tasks = self.tasks.write().await;
            for task in tasks.drain(..) {
                task.abort();
            }
        }

        self.endpoint.close().await;
        info!("node stopped");
    }

    /// This node's endpoint id.
    pub fn endpoint_id(&self) -> EndpointId {
        self.endpoint.id()
    }

    /// This node's current dialable address.
    pub fn addr(&self) -> EndpointAddr {
        self.endpoint.addr()
    }

    /// The content cache.
    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// The exchange service.
    pub fn exchange(&self) -> &Arc<ExchangeService> {
        &self.exchange
    }

    /// The peer roster.
    pub fn roster(&self) -> &Arc<PeerRoster> {
        &self.roster
    }

    /// Current roster peer ids, in the order `request_file` would try them.
    pub fn connected_peers(&self) -> Vec<EndpointId> {
        self.roster.peer_ids()
    }

    /// The node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Discovery coupling point: a collaborator found a peer.
    ///
    /// Attempts a probe connection within the connect timeout; only a peer
    /// we could actually reach is added to the roster.
    pub async fn handle_peer_found(&self, addr: EndpointAddr) -> Result<(), NodeError> {
        if addr.id == self.endpoint.id() {
            return Ok(());
        }

        let peer = addr.id;
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        match timeout(
            connect_timeout,
            self.endpoint.connect(addr.clone(), FILE_REQUEST_ALPN),
        )
        .await
        {
            Ok(Ok(conn)) => {
                conn.close(0u32.into(), b"probe");
                self.roster.add(addr);
                info!(peer = %hex::encode(&peer.as_bytes()[..8]), "connected to peer");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(
                    peer = %hex::encode(&peer.as_bytes()[..8]),
                    error = %e,
                    "failed to connect to discovered peer"
                );
                Err(NodeError::Network(e.to_string()))
            }
            Err(_) => {
                warn!(
                    peer = %hex::encode(&peer.as_bytes()[..8]),
                    "timed out connecting to discovered peer"
                );
                Err(NodeError::Network("connect timeout".to_string()))
            }
        }
    }

    /// Manually connect to a peer by address.
    pub async fn connect_to_peer(&self, addr: EndpointAddr) -> Result<(), NodeError> {
        self.handle_peer_found(addr).await
    }

    /// Request a file from connected peers.
    ///
    /// Does not touch the local cache; the filesystem bridge (or other
    /// caller) decides whether to store the result.
    pub async fn request_file(&self, name: &str) -> Result<Vec<u8>, NodeError> {
        self.exchange
            .request_file(name)
            .await
            .map_err(|e| NodeError::from_exchange(e, name))
    }

    /// Broadcast a file to all connected peers, fire-and-forget.
    pub async fn broadcast_file(&self, name: &str, data: Vec<u8>) {
        self.exchange.broadcast_file(name, data).await;
    }

    /// Mount the filesystem bridge at `mountpoint`.
    ///
    /// The returned session keeps the mount alive; drop it (or call
    /// `join()`) to unmount.
    pub fn mount(&self, mountpoint: &Path) -> Result<fuser::BackgroundSession, NodeError> {
        let bridge = fs::CacheFs::new(self.cache.clone(), self.exchange.clone())
            .map_err(|e| NodeError::Mount(e.to_string()))?;
        fs::spawn_mount(bridge, mountpoint).map_err(|e| NodeError::Mount(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_node, wait_for_entry, wire};

    #[tokio::test]
    async fn test_start_and_stop() {
        let node = memory_node().await;
        assert_eq!(node.cache().capacity(), 10 * 1024 * 1024);
        assert!(node.connected_peers().is_empty());
        node.stop().await;
    }

    #[tokio::test]
    async fn test_nodes_have_distinct_identities() {
        let a = memory_node().await;
        let b = memory_node().await;
        assert_ne!(a.endpoint_id(), b.endpoint_id());
        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_request_file_with_no_peers_is_not_found() {
        let node = memory_node().await;
        let result = node.request_file("missing").await;
        assert!(matches!(result, Err(NodeError::NotFound(_))));
        node.stop().await;
    }

    #[tokio::test]
    async fn test_handle_peer_found_ignores_self() {
        let node = memory_node().await;
        node.handle_peer_found(node.addr()).await.unwrap();
        assert!(node.connected_peers().is_empty());
        node.stop().await;
    }

    #[tokio::test]
    async fn test_peer_found_adds_to_roster() {
        let a = memory_node().await;
        let b = memory_node().await;

        a.handle_peer_found(b.addr()).await.unwrap();
        assert_eq!(a.connected_peers(), vec![b.endpoint_id()]);

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_fetch_from_peer() {
        let a = memory_node().await;
        let b = memory_node().await;
        wire(&a, &b).await;

        b.cache().put("shared.txt", b"hello from b".to_vec());

        let data = a.request_file("shared.txt").await.unwrap();
        assert_eq!(data, b"hello from b");

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_fetch_unknown_name_is_not_found() {
        let a = memory_node().await;
        let b = memory_node().await;
        wire(&a, &b).await;

        let result = a.request_file("nobody-has-this").await;
        assert!(matches!(result, Err(NodeError::NotFound(_))));

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_broadcast_propagates() {
        let a = memory_node().await;
        let b = memory_node().await;
        wire(&a, &b).await;

        a.broadcast_file("announce.txt", b"fresh data".to_vec()).await;

        assert!(wait_for_entry(b.cache(), "announce.txt", b"fresh data").await);

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_broadcast_overwrites_receiver_entry() {
        let a = memory_node().await;
        let b = memory_node().await;
        wire(&a, &b).await;

        b.cache().put("doc", b"stale".to_vec());
        a.broadcast_file("doc", b"current".to_vec()).await;

        assert!(wait_for_entry(b.cache(), "doc", b"current").await);

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_delete_then_refetch() {
        let a = memory_node().await;
        let b = memory_node().await;
        wire(&a, &b).await;

        a.cache().put("doc", b"v1".to_vec());
        b.cache().put("doc", b"v2".to_vec());

        // Local delete, then a lookup-style fetch goes back to the network.
        assert!(a.cache().delete("doc"));
        let fetched = crate::fs::lookup_or_fetch(a.exchange(), "doc").await;
        assert_eq!(fetched, Some(b"v2".to_vec()));
        assert!(a.cache().contains("doc"));

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_fetch_then_cache_visible_in_keys() {
        let a = memory_node().await;
        let b = memory_node().await;
        wire(&a, &b).await;

        b.cache().put("k", b"v".to_vec());

        let data = crate::fs::lookup_or_fetch(a.exchange(), "k").await;
        assert_eq!(data, Some(b"v".to_vec()));
        // The fetch populated the cache: no further network call needed.
        assert!(a.cache().keys().contains(&"k".to_string()));
        assert_eq!(a.cache().get("k"), Some(b"v".to_vec()));

        a.stop().await;
        b.stop().await;
    }
}
