//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections and enqueue them for the workers
//! - Apply backpressure by waiting on a full queue
//! - Graceful handling of accept errors

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::config::ListenerConfig;
use crate::dispatch::BoundedQueue;
use crate::net::connection::{ClientConnection, ConnectionTracker};
use crate::observability::metrics;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),
}

/// Connections as the acceptor hands them to the workers.
pub type TcpConnection = ClientConnection<TcpStream>;

/// A bound TCP listener feeding the work queue.
pub struct Listener {
    inner: TcpListener,
    tracker: ConnectionTracker,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            inner: listener,
            tracker: ConnectionTracker::new(),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Tracker counting connections accepted by this listener and not yet closed.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept until `shutdown` fires, enqueueing every connection.
    ///
    /// Waits on the queue while it is full. Closes the queue on return so
    /// idle workers wake up and exit.
    pub async fn run(
        self,
        queue: Arc<BoundedQueue<TcpConnection>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Accept loop stopping");
                    break;
                }
                accepted = self.inner.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let conn = ClientConnection::new(stream, Some(peer), self.tracker.track());
                    tracing::debug!(
                        connection_id = %conn.id(),
                        peer_addr = %peer,
                        queued = queue.len(),
                        "Connection accepted"
                    );
                    if queue.enqueue(conn).await.is_err() {
                        tracing::warn!("Work queue closed; accept loop stopping");
                        break;
                    }
                    metrics::record_queue_depth(queue.len());
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        queue.close();
    }
}
