//! Incoming exchange handlers
//!
//! Handles connections initiated by other peers:
//! - File Request: look the name up in the local cache, answer with the raw
//!   bytes or close empty-handed
//! - File Broadcast: parse the header, read the body, overwrite the local
//!   cache entry

use iroh::endpoint::Connection;
use iroh::EndpointId;
use tracing::{debug, info, trace};

use super::protocol::{decode_broadcast, decode_request, MAX_NAME_LEN, MAX_TRANSFER_SIZE};
use super::service::ExchangeService;

/// Upper bound for a complete broadcast message: header plus body.
const MAX_BROADCAST_MSG_SIZE: usize = MAX_TRANSFER_SIZE + MAX_NAME_LEN + 32;

impl ExchangeService {
    /// Handle an inbound File Request connection.
    ///
    /// One connection may carry several request streams in sequence; the
    /// loop ends when the requester closes the connection.
    pub(crate) async fn handle_request_connection(&self, conn: Connection, peer: EndpointId) {
        loop {
            let (mut send, mut recv) = match conn.accept_bi().await {
                Ok(streams) => streams,
                Err(e) => {
                    trace!(error = %e, "request connection ended");
                    break;
                }
            };

            let buf = match recv.read_to_end(MAX_NAME_LEN + 1).await {
                Ok(data) => data,
                Err(e) => {
                    debug!(error = %e, "failed to read file request");
                    continue;
                }
            };

            let name = match decode_request(&buf) {
                Ok(name) => name,
                Err(e) => {
                    debug!(error = %e, "malformed file request, closing empty");
                    let _ = send.finish();
                    continue;
                }
            };

            match self.cache().get(name) {
                Some(data) => {
                    if let Err(e) = send.write_all(&data).await {
                        debug!(name = %name, error = %e, "failed to send file");
                        continue;
                    }
                    if let Err(e) = send.finish() {
                        debug!(name = %name, error = %e, "failed to finish response stream");
                        continue;
                    }
                    info!(
                        name = %name,
                        peer = %hex::encode(&peer.as_bytes()[..8]),
                        size = data.len(),
                        "request: file served to peer"
                    );
                }
                None => {
                    // Absent: close without writing anything. The requester
                    // reads an empty response and treats it as not-found.
                    debug!(name = %name, "request: name not cached, closing empty");
                    let _ = send.finish();
                }
            }
        }
    }

    /// Handle an inbound File Broadcast connection.
    ///
    /// Each broadcast rides its own connection with a single unidirectional
    /// stream. Malformed messages are discarded without touching the cache.
    pub(crate) async fn handle_broadcast_connection(&self, conn: Connection, peer: EndpointId) {
        let mut recv = match conn.accept_uni().await {
            Ok(stream) => stream,
            Err(e) => {
                debug!(error = %e, "failed to accept broadcast stream");
                return;
            }
        };

        let buf = match recv.read_to_end(MAX_BROADCAST_MSG_SIZE).await {
            Ok(data) => data,
            Err(e) => {
                debug!(error = %e, "failed to read broadcast");
                return;
            }
        };

        if self.apply_broadcast(&buf, peer) {
            // Closing tells the sender the broadcast has been drained.
            conn.close(0u32.into(), b"ok");
        }
    }

    /// Parse a complete broadcast message and overwrite the cache entry.
    ///
    /// Broadcasts are trusted: no provenance check, last arrival wins.
    /// Returns whether the message was well-formed and applied.
    pub(crate) fn apply_broadcast(&self, buf: &[u8], peer: EndpointId) -> bool {
        let (name, body) = match decode_broadcast(buf) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, bytes = buf.len(), "discarding malformed broadcast");
                return false;
            }
        };

        self.cache().put(name, body.to_vec());
        info!(
            name = %name,
            peer = %hex::encode(&peer.as_bytes()[..8]),
            size = body.len(),
            "broadcast: received"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::ContentCache;
    use crate::network::exchange::protocol::encode_broadcast_header;
    use crate::network::roster::PeerRoster;

    fn test_service() -> ExchangeService {
        ExchangeService::for_testing(
            Arc::new(ContentCache::new(1024)),
            Arc::new(PeerRoster::new()),
        )
    }

    fn test_peer() -> EndpointId {
        iroh::SecretKey::from_bytes(&[7u8; 32]).public()
    }

    #[test]
    fn test_apply_broadcast_overwrites_entry() {
        let service = test_service();
        service.cache().put("x", b"old".to_vec());

        let mut msg = encode_broadcast_header("x", 3).unwrap();
        msg.extend_from_slice(b"new");
        assert!(service.apply_broadcast(&msg, test_peer()));
        assert_eq!(service.cache().get("x"), Some(b"new".to_vec()));
    }

    #[test]
    fn test_apply_broadcast_creates_entry() {
        let service = test_service();
        let body = b"payload";
        let mut msg = encode_broadcast_header("fresh", body.len()).unwrap();
        msg.extend_from_slice(body);

        assert!(service.apply_broadcast(&msg, test_peer()));
        assert_eq!(service.cache().get("fresh"), Some(body.to_vec()));
    }

    #[test]
    fn test_malformed_broadcast_discarded() {
        let service = test_service();
        service.cache().put("x", b"keep".to_vec());

        assert!(!service.apply_broadcast(b"garbage with no header", test_peer()));
        // Short body must not corrupt the cache either.
        let mut short = encode_broadcast_header("x", 100).unwrap();
        short.extend_from_slice(b"only-a-bit");
        assert!(!service.apply_broadcast(&short, test_peer()));

        assert_eq!(service.cache().get("x"), Some(b"keep".to_vec()));
    }

    #[test]
    fn test_empty_broadcast_body_applies() {
        let service = test_service();
        let msg = encode_broadcast_header("now-empty", 0).unwrap();
        assert!(service.apply_broadcast(&msg, test_peer()));
        assert_eq!(service.cache().get("now-empty"), Some(Vec::new()));
    }
}
