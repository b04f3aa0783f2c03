//! UDP datagram receive loop.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use vidcat_core::{Error, Result};

use crate::engine::RolloverEngine;

/// Receives datagrams and appends each one to the engine's buffer.
pub struct StreamIngestor {
    socket: UdpSocket,
    engine: Arc<RolloverEngine>,
    max_datagram_size: usize,
}

impl StreamIngestor {
    /// Bind the receive socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a zero datagram size and
    /// [`Error::Io`] if the socket cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        engine: Arc<RolloverEngine>,
        max_datagram_size: usize,
    ) -> Result<Self> {
        if max_datagram_size == 0 {
            return Err(Error::invalid_argument("max_datagram_size must be positive"));
        }
        let socket = UdpSocket::bind(addr).await?;
        tracing::info!(addr = %socket.local_addr()?, "Listening for stream datagrams");
        Ok(Self {
            socket,
            engine,
            max_datagram_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until `cancel` fires or the engine stops accepting data.
    ///
    /// Receive errors are logged and the loop keeps going.
    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; self.max_datagram_size];
        let mut received: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, peer)) => {
                            if !self.engine.ingest(&buf[..len]) {
                                tracing::debug!(%peer, "Stream terminated; stopping receive loop");
                                break;
                            }
                            received += 1;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Datagram receive failed");
                        }
                    }
                }
            }
        }

        tracing::info!(datagrams = received, "Ingest loop stopped");
    }
}

impl std::fmt::Debug for StreamIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamIngestor")
            .field("local_addr", &self.socket.local_addr().ok())
            .field("max_datagram_size", &self.max_datagram_size)
            .finish_non_exhaustive()
    }
}
