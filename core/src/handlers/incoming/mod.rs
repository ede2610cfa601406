//! Incoming connection handlers
//!
//! Accepts inbound connections and routes them by ALPN:
//! - File Request: serve blobs out of the local cache
//! - File Broadcast: overwrite local cache entries with pushed blobs
//!
//! Each accepted connection runs in its own task; no global loop serializes
//! stream handling.

use std::sync::Arc;
use std::time::Duration;

use iroh::{Endpoint, EndpointAddr};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::network::exchange::{ExchangeService, FILE_BROADCAST_ALPN, FILE_REQUEST_ALPN};
use crate::network::roster::PeerRoster;
use crate::protocol::Node;

impl Node {
    /// Accept loop for inbound exchange connections.
    ///
    /// Runs until the running flag is cleared or the endpoint shuts down.
    pub(crate) async fn run_incoming_handler(
        endpoint: Endpoint,
        exchange: Arc<ExchangeService>,
        roster: Arc<PeerRoster>,
        running: Arc<RwLock<bool>>,
    ) {
        loop {
            if !*running.read().await {
                break;
            }

            let incoming = tokio::select! {
                conn = endpoint.accept() => conn,
                _ = tokio::time::sleep(Duration::from_millis(100)) => continue,
            };

            let Some(incoming) = incoming else {
                // Endpoint is shutting down
                break;
            };

            let conn = match incoming.await {
                Ok(conn) => conn,
                Err(e) => {
                    debug!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let alpn = conn.alpn();
            let remote = match conn.remote_id() {
                Ok(id) => id,
                Err(e) => {
                    debug!(error = %e, "failed to get remote endpoint id");
                    continue;
                }
            };

            trace!(
                peer = %hex::encode(&remote.as_bytes()[..8]),
                alpn = ?alpn,
                "accepted connection"
            );

            // A peer that dials us counts as connected. Id-only entry: don't
            // clobber a richer address learned from discovery.
            if !roster.contains(&remote) {
                roster.add(EndpointAddr::from(remote));
            }

            if alpn.as_deref() == Some(FILE_REQUEST_ALPN) {
                let exchange = exchange.clone();
                tokio::spawn(async move {
                    exchange.handle_request_connection(conn, remote).await;
                });
            } else if alpn.as_deref() == Some(FILE_BROADCAST_ALPN) {
                let exchange = exchange.clone();
                tokio::spawn(async move {
                    exchange.handle_broadcast_connection(conn, remote).await;
                });
            } else {
                debug!(alpn = ?alpn, "connection with unexpected ALPN, dropping");
            }
        }
    }
}
