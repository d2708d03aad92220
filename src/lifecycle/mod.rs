//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT / Ctrl-C → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → accept loop stops → queue closes → workers drain and exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
