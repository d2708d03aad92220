//! Fixed-capacity FIFO shared by the acceptor and the workers.
//!
//! Two semaphores count free and filled slots; the deque itself is only
//! touched under a short, never-awaited lock. A producer holding a
//! free-slot permit is guaranteed room, a consumer holding a filled-slot
//! permit is guaranteed an item.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::Semaphore;

/// Returned by [`BoundedQueue::enqueue`] once the queue is closed.
/// Carries the rejected item back to the caller.
#[derive(Debug, Error)]
#[error("queue is closed")]
pub struct QueueClosed<T>(pub T);

/// Bounded multi-producer multi-consumer queue with blocking semantics.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    free_slots: Semaphore,
    filled_slots: Semaphore,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// `capacity` must be between 1 and [`Semaphore::MAX_PERMITS`];
    /// configuration validation enforces this before the queue is built.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            free_slots: Semaphore::new(capacity),
            filled_slots: Semaphore::new(0),
            capacity,
        }
    }

    /// Append `item`, waiting while the queue is full.
    pub async fn enqueue(&self, item: T) -> Result<(), QueueClosed<T>> {
        let Ok(permit) = self.free_slots.acquire().await else {
            return Err(QueueClosed(item));
        };
        permit.forget();

        self.lock().push_back(item);
        self.filled_slots.add_permits(1);
        Ok(())
    }

    /// Remove the oldest item, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue has been closed.
    pub async fn dequeue(&self) -> Option<T> {
        let permit = self.filled_slots.acquire().await.ok()?;
        permit.forget();

        let item = self.lock().pop_front();
        self.free_slots.add_permits(1);
        item
    }

    /// Close the queue. Blocked and future producers get their item back,
    /// consumers see `None`. Items still queued are dropped with the queue.
    pub fn close(&self) {
        self.free_slots.close();
        self.filled_slots.close();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.filled_slots.is_closed()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // The critical sections cannot panic halfway through a mutation.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
