//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// User-Agent sent to every origin in place of the client's own.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3";

/// Root configuration for the forwarding proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Work queue and worker pool sizing.
    pub dispatch: DispatchConfig,

    /// Request parsing and relay behaviour.
    pub relay: RelayConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Bounded queue and worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of long-lived workers serving connections.
    pub workers: usize,

    /// Slots in the accepted-connection queue. The acceptor waits when full.
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 64,
            queue_capacity: 1024,
        }
    }
}

/// Request parsing and forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Size of one read buffer; also the longest accepted line.
    pub read_buffer_size: usize,

    /// Remaining buffer capacity below which header parsing asks for a
    /// fresh buffer instead of failing.
    pub continuation_margin: usize,

    /// Outbound buffer capacity factor used once a header block spilled
    /// over more than one read buffer.
    pub oversize_multiplier: usize,

    /// Client protocol versions that are translated and forwarded.
    /// Anything else is dropped without a diagnostic.
    pub accepted_versions: Vec<String>,

    /// Port used when an absolute URI names none.
    pub default_port: u16,

    /// Host targeted by the bare `/` request form.
    pub fallback_host: String,

    /// Port targeted by the bare `/` request form.
    pub fallback_port: u16,

    /// User-Agent injected into every forwarded request.
    pub user_agent: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 8192,
            continuation_margin: 120,
            oversize_multiplier: 4,
            accepted_versions: vec!["HTTP/1.1".to_string(), "HTTP/1.0".to_string()],
            default_port: 8080,
            fallback_host: "localhost".to_string(),
            fallback_port: 8080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl RelayConfig {
    /// Whether `version` is in the accepted set (ASCII case-insensitive).
    pub fn accepts_version(&self, version: &str) -> bool {
        self.accepted_versions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(version))
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
