//! Testing utilities
//!
//! In-process helpers for exercising real nodes over loopback endpoints:
//! start nodes with the testing config and wire their rosters directly,
//! bypassing discovery entirely.
//!
//! # Example
//!
//! ```ignore
//! let a = memory_node().await;
//! let b = memory_node().await;
//! wire(&a, &b).await;
//!
//! b.cache().put("k", b"v".to_vec());
//! let data = a.request_file("k").await.unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::cache::ContentCache;
use crate::protocol::{Node, NodeConfig};

/// Start a node with the testing config (small cache, short timeouts).
pub async fn memory_node() -> Node {
    Node::start(NodeConfig::for_testing())
        .await
        .expect("failed to start test node")
}

/// Wire two nodes together in both directions using their live endpoint
/// addresses.
pub async fn wire(a: &Node, b: &Node) {
    connect_with_retry(a, b).await;
    connect_with_retry(b, a).await;
}

/// Dial `to` from `from`, retrying while the target's direct addresses are
/// still being discovered.
async fn connect_with_retry(from: &Node, to: &Node) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match from.handle_peer_found(to.addr()).await {
            Ok(()) => return,
            Err(e) => {
                if Instant::now() >= deadline {
                    panic!("could not wire test nodes: {}", e);
                }
                sleep(Duration::from_millis(200)).await;
            }
        }
    }
}

/// Poll `cache` until `key` holds `expected`, bounded by a 10s deadline.
pub async fn wait_for_entry(cache: &Arc<ContentCache>, key: &str, expected: &[u8]) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if cache.get(key).as_deref() == Some(expected) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(50)).await;
    }
}
