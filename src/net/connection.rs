//! Accepted client connections and their lifetime tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count connections from accept until their worker closes them
//! - Close each connection exactly once

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts connections that have been accepted but not yet closed,
/// whether they are still queued or being served.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    open: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new open connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            open: Arc::clone(&self.open),
            id: ConnectionId::new(),
        }
    }

    pub fn open_count(&self) -> u64 {
        self.open.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements the open count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    open: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// A client stream handed from the acceptor to exactly one worker.
#[derive(Debug)]
pub struct ClientConnection<S> {
    stream: S,
    peer: Option<SocketAddr>,
    guard: ConnectionGuard,
}

impl<S> ClientConnection<S> {
    pub fn new(stream: S, peer: Option<SocketAddr>, guard: ConnectionGuard) -> Self {
        Self {
            stream,
            peer,
            guard,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: AsyncWrite + Unpin> ClientConnection<S> {
    /// Shut the write side down and release the connection.
    pub async fn close(mut self) {
        if let Err(err) = self.stream.shutdown().await {
            tracing::trace!(connection_id = %self.id(), error = %err, "shutdown failed");
        }
    }
}
