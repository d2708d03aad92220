//! HTTP relay subsystem.
//!
//! # Data Flow
//! ```text
//! client connection (owned by one worker)
//!     → request.rs (request line: method, uri, version policy)
//!     → target.rs (uri → host, port, path)
//!     → headers.rs (seeded header table, segment reads, outbound head)
//!     → forward.rs (origin connect, head + POST body, response stream)
//!     → back to the client
//!
//! Any stage may fail:
//!     → error.rs (RelayError → diagnostic or silent abort)
//!     → diagnostic.rs (three-line plain-text block to the client)
//! ```
//!
//! # Design Decisions
//! - All request state is created inside `pipeline::RelayPipeline::serve`
//!   and dropped when it returns; nothing outlives one relay
//! - Upstream requests are always HTTP/1.0 with `Connection: close`
//! - Responses are relayed unmodified, one line at a time
//! - No retries: one failed origin connect ends the request

pub mod diagnostic;
pub mod error;
pub mod forward;
pub mod headers;
pub mod line;
pub mod pipeline;
pub mod request;
pub mod target;

pub use diagnostic::Diagnostic;
pub use error::RelayError;
pub use headers::HeaderTable;
pub use pipeline::{Disposition, RelayPipeline, RelaySummary};
pub use request::{Method, RequestLine};
pub use target::ResolvedTarget;
