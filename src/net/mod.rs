//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop)
//!     → connection.rs (id, open-connection tracking)
//!     → bounded work queue (dispatch)
//! ```
//!
//! # Design Decisions
//! - The accept loop never serves a request itself
//! - A full queue blocks the accept loop (natural backpressure)
//! - Each connection tracked until its worker closes it

pub mod connection;
pub mod listener;

pub use connection::{ClientConnection, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError, TcpConnection};
