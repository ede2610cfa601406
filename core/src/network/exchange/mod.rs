//! Peer file-exchange protocol
//!
//! Request/response and broadcast message exchange over per-peer streams,
//! layered on the content cache. See `protocol.rs` for the wire format.

pub mod incoming;
pub mod outgoing;
pub mod protocol;
pub mod service;

pub use protocol::{FILE_BROADCAST_ALPN, FILE_REQUEST_ALPN, MAX_NAME_LEN, MAX_TRANSFER_SIZE};
pub use service::{ExchangeError, ExchangeService};
