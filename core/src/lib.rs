//! Skiff Core
//!
//! A node in a peer-assisted content cache: a local store of named byte
//! blobs, transparently exposed as a filesystem and kept available even when
//! the data does not exist locally yet: cache misses are fetched from peers
//! on demand, and local writes are pushed out to all connected peers.
//!
//! This crate provides:
//! - A capacity-bounded in-memory LRU content cache
//! - The peer file-exchange protocol (request + broadcast) over Iroh streams
//! - A FUSE bridge presenting every cached/fetchable name as a file
//!
//! # Module Structure
//!
//! - `protocol/`: Public interface (Node, config, errors)
//! - `handlers/`: Inbound connection accept loop
//! - `network/`: Exchange protocol and peer roster
//! - `cache/`: The content cache
//! - `fs/`: Filesystem bridge adapter
//! - `testing/`: Test utilities
//!
//! # Quick Start
//!
//! ```ignore
//! use skiff_core::{Node, NodeConfig};
//!
//! // Start a node
//! let node = Node::start(NodeConfig::default()).await?;
//!
//! // Feed it peers from your discovery mechanism
//! node.handle_peer_found(peer_addr).await?;
//!
//! // Expose the cache as a filesystem
//! let session = node.mount("/mnt/skiff".as_ref())?;
//! ```

// Public interface
pub mod protocol;

// Internal modules
pub(crate) mod handlers;

// Infrastructure modules (pub for flexibility)
pub mod cache;
pub mod fs;
pub mod network;
pub mod testing;

// Re-export main API types for convenience
pub use cache::ContentCache;
pub use fs::{lookup_or_fetch, mount, spawn_mount, CacheFs, FsError};
pub use network::{
    ExchangeError, ExchangeService, PeerRoster, FILE_BROADCAST_ALPN, FILE_REQUEST_ALPN,
};
pub use protocol::{Node, NodeConfig, NodeError};
