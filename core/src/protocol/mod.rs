//! Node - Public Interface
//!
//! This module provides the public API for a skiff node.
//!
//! # Module Structure
//!
//! - `core.rs`: Node struct, start/stop, lifecycle
//! - `config.rs`: NodeConfig builder
//! - `error.rs`: NodeError
//!
//! # Example
//!
//! ```ignore
//! use skiff_core::{Node, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let node = Node::start(NodeConfig::default()).await?;
//!
//!     // Hand discovered peers to the node
//!     node.handle_peer_found(peer_addr).await?;
//!
//!     // Expose the cache as a filesystem
//!     let session = node.mount("/mnt/skiff".as_ref())?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     drop(session);
//!     node.stop().await;
//!     Ok(())
//! }
//! ```

mod config;
pub(crate) mod core;
mod error;

pub use config::NodeConfig;
pub use core::Node;
pub use error::NodeError;
