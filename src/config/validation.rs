//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool sizes > 0, ports valid, buffer margins sane)
//! - Validate the protocol version policy
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },

    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        max: usize,
        value: usize,
    },

    #[error("relay.read_buffer_size ({buffer}) must exceed relay.continuation_margin ({margin})")]
    MarginExceedsBuffer { buffer: usize, margin: usize },

    #[error("relay.accepted_versions must not be empty")]
    NoAcceptedVersions,

    #[error("relay.accepted_versions contains unsupported version {0}")]
    UnsupportedVersion(String),

    #[error("{0} must be a positive port number")]
    ZeroPort(&'static str),

    #[error("relay.user_agent must be non-empty and contain no line breaks")]
    InvalidUserAgent,
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(
        &mut errors,
        "listener.bind_address",
        &config.listener.bind_address,
    );
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let dispatch = &config.dispatch;
    if dispatch.workers == 0 {
        errors.push(ValidationError::TooSmall {
            field: "dispatch.workers",
            min: 1,
            value: 0,
        });
    }
    if dispatch.queue_capacity == 0 {
        errors.push(ValidationError::TooSmall {
            field: "dispatch.queue_capacity",
            min: 1,
            value: 0,
        });
    } else if dispatch.queue_capacity > Semaphore::MAX_PERMITS {
        errors.push(ValidationError::TooLarge {
            field: "dispatch.queue_capacity",
            max: Semaphore::MAX_PERMITS,
            value: dispatch.queue_capacity,
        });
    }

    let relay = &config.relay;
    if relay.read_buffer_size <= relay.continuation_margin {
        errors.push(ValidationError::MarginExceedsBuffer {
            buffer: relay.read_buffer_size,
            margin: relay.continuation_margin,
        });
    }
    if relay.oversize_multiplier == 0 {
        errors.push(ValidationError::TooSmall {
            field: "relay.oversize_multiplier",
            min: 1,
            value: 0,
        });
    }
    if relay.accepted_versions.is_empty() {
        errors.push(ValidationError::NoAcceptedVersions);
    }
    for version in &relay.accepted_versions {
        let known = ["HTTP/1.0", "HTTP/1.1"]
            .iter()
            .any(|v| v.eq_ignore_ascii_case(version));
        if !known {
            errors.push(ValidationError::UnsupportedVersion(version.clone()));
        }
    }
    if relay.default_port == 0 {
        errors.push(ValidationError::ZeroPort("relay.default_port"));
    }
    if relay.fallback_port == 0 {
        errors.push(ValidationError::ZeroPort("relay.fallback_port"));
    }
    if relay.user_agent.is_empty() || relay.user_agent.contains(['\r', '\n']) {
        errors.push(ValidationError::InvalidUserAgent);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
