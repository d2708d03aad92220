//! Connection dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! acceptor
//!     → queue.rs (BoundedQueue: waits while full, FIFO)
//!     → pool.rs (N workers: dequeue → ConnectionHandler → close)
//! ```
//!
//! # Design Decisions
//! - The queue is the only state shared between connections
//! - Queue and pipeline are handed to the acceptor and workers at start-up
//! - Worker count, not runtime threads, bounds concurrent relays

pub mod pool;
pub mod queue;

pub use pool::{ConnectionHandler, WorkerPool};
pub use queue::{BoundedQueue, QueueClosed};
