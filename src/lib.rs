//! Forwarding HTTP/1.x proxy library.
//!
//! Accepted connections go through a bounded queue to a fixed pool of
//! workers; each worker parses one request, rewrites it for the origin,
//! relays it and streams the response back.

pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod server;

pub use config::ProxyConfig;
pub use lifecycle::Shutdown;
pub use server::ProxyServer;
