//! Network layer
//!
//! Contains:
//! - Exchange: the peer file-exchange protocol (request + broadcast)
//! - Roster: the shared map of known peers
//!
//! Each protocol message kind has its own ALPN.

pub mod exchange;
pub mod roster;

pub use exchange::{ExchangeError, ExchangeService, FILE_BROADCAST_ALPN, FILE_REQUEST_ALPN};
pub use roster::PeerRoster;
