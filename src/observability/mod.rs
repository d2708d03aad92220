//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! acceptor, workers, relay stages produce:
//!     → logging.rs (structured log events, one span per connection)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Connection ID flows through every log line of a relay
//! - Metric calls are no-ops unless the exporter is installed

pub mod logging;
pub mod metrics;
