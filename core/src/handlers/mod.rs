//! Connection Handlers
//!
//! This module handles incoming network connections:
//! - `incoming/`: Handlers for connections initiated by other nodes

pub(crate) mod incoming;
