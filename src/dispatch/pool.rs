//! Fixed-size worker pool.
//!
//! Each worker loops: dequeue one connection, run the handler on it to
//! completion, close it, repeat. A panic inside one handler run is caught
//! here so the worker survives and keeps serving.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

use crate::dispatch::queue::BoundedQueue;
use crate::net::connection::ClientConnection;
use crate::observability::metrics;
use crate::relay::{Disposition, RelayPipeline};

/// Serves one dequeued connection. Implemented by [`RelayPipeline`].
pub trait ConnectionHandler<S>: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        conn: &'a mut ClientConnection<S>,
    ) -> impl Future<Output = Disposition> + Send + 'a;
}

impl<S> ConnectionHandler<S> for RelayPipeline
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn handle<'a>(
        &'a self,
        conn: &'a mut ClientConnection<S>,
    ) -> impl Future<Output = Disposition> + Send + 'a {
        RelayPipeline::handle(self, conn)
    }
}

/// Handles to the running workers.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `size` workers pulling from `queue`.
    pub fn spawn<S, H>(
        size: usize,
        queue: Arc<BoundedQueue<ClientConnection<S>>>,
        handler: Arc<H>,
    ) -> Self
    where
        S: AsyncWrite + Unpin + Send + 'static,
        H: ConnectionHandler<S>,
    {
        let workers = (0..size)
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let handler = Arc::clone(&handler);
                tokio::spawn(run_worker(worker, queue, handler))
            })
            .collect();

        tracing::info!(workers = size, queue_capacity = queue.capacity(), "Worker pool started");
        Self { workers }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Wait for every worker to exit. Workers exit once the queue is closed.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "Worker task failed");
            }
        }
    }
}

async fn run_worker<S, H>(
    worker: usize,
    queue: Arc<BoundedQueue<ClientConnection<S>>>,
    handler: Arc<H>,
) where
    S: AsyncWrite + Unpin + Send + 'static,
    H: ConnectionHandler<S>,
{
    while let Some(mut conn) = queue.dequeue().await {
        metrics::record_queue_depth(queue.len());

        let outcome = AssertUnwindSafe(handler.handle(&mut conn))
            .catch_unwind()
            .await;
        match outcome {
            Ok(disposition) => {
                tracing::trace!(worker, connection_id = %conn.id(), ?disposition, "Connection served");
            }
            Err(_) => {
                tracing::error!(worker, connection_id = %conn.id(), "Relay panicked; connection dropped");
                metrics::record_worker_panic();
            }
        }

        conn.close().await;
    }

    tracing::debug!(worker, "Worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::net::connection::ConnectionTracker;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    /// Panics on its first connection and answers every later one.
    struct PanicsOnce {
        calls: AtomicUsize,
    }

    impl ConnectionHandler<DuplexStream> for PanicsOnce {
        fn handle<'a>(
            &'a self,
            conn: &'a mut ClientConnection<DuplexStream>,
        ) -> impl Future<Output = Disposition> + Send + 'a {
            async move {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("relay blew up");
                }
                conn.stream_mut().write_all(b"served").await.unwrap();
                Disposition::Relayed
            }
        }
    }

    #[tokio::test]
    async fn workers_serve_queued_connections_and_close_them() {
        let tracker = ConnectionTracker::new();
        let queue = Arc::new(BoundedQueue::<ClientConnection<DuplexStream>>::new(8));
        let pipeline = Arc::new(RelayPipeline::new(RelayConfig::default()));
        let pool = WorkerPool::spawn(2, Arc::clone(&queue), pipeline);
        assert_eq!(pool.len(), 2);

        let mut clients = Vec::new();
        for _ in 0..5 {
            let (mut client, server) = duplex(1024);
            client.write_all(b"FETCH / HTTP/1.0\r\n\r\n").await.unwrap();
            queue
                .enqueue(ClientConnection::new(server, None, tracker.track()))
                .await
                .unwrap();
            clients.push(client);
        }

        for mut client in clients {
            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            assert!(response.starts_with(b"\r\n501: Not Implemented\r\n"));
        }

        queue.close();
        pool.join().await;
        assert_eq!(tracker.open_count(), 0);
    }

    #[tokio::test]
    async fn workers_exit_when_queue_closes() {
        let queue = Arc::new(BoundedQueue::<ClientConnection<DuplexStream>>::new(1));
        let pipeline = Arc::new(RelayPipeline::new(RelayConfig::default()));
        let pool = WorkerPool::spawn(3, Arc::clone(&queue), pipeline);

        queue.close();
        tokio::time::timeout(std::time::Duration::from_secs(1), pool.join())
            .await
            .expect("workers should stop after close");
    }

    #[tokio::test]
    async fn worker_survives_a_panicking_relay() {
        let tracker = ConnectionTracker::new();
        let queue = Arc::new(BoundedQueue::<ClientConnection<DuplexStream>>::new(4));
        let handler = Arc::new(PanicsOnce {
            calls: AtomicUsize::new(0),
        });
        let pool = WorkerPool::spawn(1, Arc::clone(&queue), Arc::clone(&handler));

        let mut clients = Vec::new();
        for _ in 0..2 {
            let (client, server) = duplex(64);
            queue
                .enqueue(ClientConnection::new(server, None, tracker.track()))
                .await
                .unwrap();
            clients.push(client);
        }

        // The panicking relay's connection is still closed, without a response.
        let mut first = Vec::new();
        clients[0].read_to_end(&mut first).await.unwrap();
        assert!(first.is_empty());

        let mut second = Vec::new();
        clients[1].read_to_end(&mut second).await.unwrap();
        assert_eq!(second, b"served");
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);

        queue.close();
        pool.join().await;
        assert_eq!(tracker.open_count(), 0);
    }
}
