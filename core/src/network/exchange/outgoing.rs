//! Outgoing exchange operations (client side)
//!
//! - `request_file`: fetch a blob from peers, one attempt at a time
//! - `broadcast_file`: push a blob to every peer, fire-and-forget

use std::time::Duration;

use iroh::{Endpoint, EndpointAddr, EndpointId};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use super::protocol::{
    encode_broadcast_header, encode_request, validate_name, FILE_BROADCAST_ALPN,
    FILE_REQUEST_ALPN, MAX_TRANSFER_SIZE,
};
use super::service::{ExchangeError, ExchangeService};

impl ExchangeService {
    /// Request a file from connected peers.
    ///
    /// Walks the roster in sorted-id order, one File Request at a time, each
    /// attempt bounded by the connect and response timeouts. The first
    /// non-empty response wins; a timeout, transport failure, or empty
    /// response just advances to the next peer. Fails with
    /// [`ExchangeError::NotFound`] when the roster is empty or exhausted.
    pub async fn request_file(&self, name: &str) -> Result<Vec<u8>, ExchangeError> {
        validate_name(name).map_err(|_| ExchangeError::InvalidName(name.to_string()))?;

        let peers = self.roster().peer_ids();
        if peers.is_empty() {
            debug!(name = %name, "request: no peers connected");
            return Err(ExchangeError::NotFound);
        }

        for peer in peers {
            match self.request_from_peer(peer, name).await {
                Ok(data) => {
                    info!(
                        name = %name,
                        peer = %hex::encode(&peer.as_bytes()[..8]),
                        size = data.len(),
                        "request: file received from peer"
                    );
                    return Ok(data);
                }
                Err(e) => {
                    debug!(
                        name = %name,
                        peer = %hex::encode(&peer.as_bytes()[..8]),
                        error = %e,
                        "request: peer attempt failed, trying next"
                    );
                }
            }
        }

        Err(ExchangeError::NotFound)
    }

    /// Issue one File Request to one peer.
    async fn request_from_peer(
        &self,
        peer: EndpointId,
        name: &str,
    ) -> Result<Vec<u8>, ExchangeError> {
        let addr = self
            .roster()
            .addr_of(&peer)
            .unwrap_or_else(|| EndpointAddr::from(peer));

        let conn = timeout(
            self.connect_timeout(),
            self.endpoint().connect(addr, FILE_REQUEST_ALPN),
        )
        .await
        .map_err(|_| ExchangeError::Timeout)?
        .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let (mut send, mut recv) = conn
            .open_bi()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let request = encode_request(name)?;
        send.write_all(&request)
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        send.finish()
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        // The response is raw bytes until the responder closes its half.
        let data = timeout(self.request_timeout(), recv.read_to_end(MAX_TRANSFER_SIZE))
            .await
            .map_err(|_| ExchangeError::Timeout)?
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        // Empty response means not-found, never a valid empty file.
        if data.is_empty() {
            return Err(ExchangeError::NotFound);
        }
        Ok(data)
    }

    /// Broadcast a file to all connected peers.
    ///
    /// One detached send task per peer; delivery is best-effort and the
    /// caller gets no report of partial failure. Returns as soon as the
    /// tasks are spawned.
    pub async fn broadcast_file(&self, name: &str, data: Vec<u8>) {
        if validate_name(name).is_err() {
            warn!(name = %name, "broadcast: skipping invalid name");
            return;
        }

        let peers = self.roster().peer_ids();
        trace!(name = %name, peers = peers.len(), size = data.len(), "broadcast: fan-out");

        for peer in peers {
            let addr = self
                .roster()
                .addr_of(&peer)
                .unwrap_or_else(|| EndpointAddr::from(peer));
            let endpoint = self.endpoint().clone();
            let name = name.to_string();
            let data = data.clone();
            let connect_timeout = self.connect_timeout();
            let request_timeout = self.request_timeout();

            tokio::spawn(async move {
                if let Err(e) = Self::send_file_to_peer(
                    &endpoint,
                    addr,
                    &name,
                    &data,
                    connect_timeout,
                    request_timeout,
                )
                .await
                {
                    debug!(
                        name = %name,
                        peer = %hex::encode(&peer.as_bytes()[..8]),
                        error = %e,
                        "broadcast: send failed"
                    );
                }
            });
        }
    }

    /// Send one File Broadcast to one peer.
    async fn send_file_to_peer(
        endpoint: &Endpoint,
        addr: EndpointAddr,
        name: &str,
        data: &[u8],
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<(), ExchangeError> {
        let conn = timeout(connect_timeout, endpoint.connect(addr, FILE_BROADCAST_ALPN))
            .await
            .map_err(|_| ExchangeError::Timeout)?
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let mut send = conn
            .open_uni()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let header = encode_broadcast_header(name, data.len())?;
        send.write_all(&header)
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        send.write_all(data)
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;
        send.finish()
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        // Hold the connection open until the receiver has drained the stream
        // and closed its side, or the deadline passes.
        let _ = timeout(request_timeout, conn.closed()).await;
        Ok(())
    }
}
