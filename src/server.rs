//! Proxy server assembly.
//!
//! # Responsibilities
//! - Build the work queue and the relay pipeline from configuration
//! - Start the worker pool
//! - Run the accept loop until shutdown, then drain the workers

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::ProxyConfig;
use crate::dispatch::{BoundedQueue, WorkerPool};
use crate::net::{Listener, TcpConnection};
use crate::relay::RelayPipeline;

/// Forwarding proxy: one acceptor, a bounded queue and a fixed worker pool.
pub struct ProxyServer {
    config: ProxyConfig,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    /// Serve connections from `listener` until `shutdown` fires.
    ///
    /// Connections still queued at shutdown are closed unserved; those
    /// already picked up by a worker run to completion first.
    pub async fn run(self, listener: Listener, shutdown: broadcast::Receiver<()>) {
        let dispatch = &self.config.dispatch;
        let queue: Arc<BoundedQueue<TcpConnection>> =
            Arc::new(BoundedQueue::new(dispatch.queue_capacity));
        let pipeline = Arc::new(RelayPipeline::new(self.config.relay.clone()));
        let pool = WorkerPool::spawn(dispatch.workers, Arc::clone(&queue), pipeline);

        match listener.local_addr() {
            Ok(addr) => tracing::info!(address = %addr, "Proxy accepting connections"),
            Err(err) => tracing::warn!(error = %err, "Listener address unavailable"),
        }

        let tracker = listener.tracker();
        listener.run(queue, shutdown).await;
        pool.join().await;

        tracing::info!(open_connections = tracker.open_count(), "Proxy stopped");
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}
