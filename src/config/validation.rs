//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check protocol paths and names are usable on the wire
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TunnelConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::TunnelConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} {value:?} must start with '/'")]
    PathPrefix { field: &'static str, value: String },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} {value:?} contains characters not allowed in a cookie")]
    CookieCharacters { field: &'static str, value: String },

    #[error("view type {0:?} must be non-empty and contain no '/'")]
    ViewName(String),

    #[error("listener.tls requires both cert_path and key_path")]
    IncompleteTls,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Cookie names and token suffixes must be plain tokens.
fn is_cookie_safe(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub fn validate_config(config: &TunnelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_concurrent_requests == 0 {
        errors.push(ValidationError::NotPositive {
            field: "listener.max_concurrent_requests",
        });
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::IncompleteTls);
        }
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::NotPositive {
            field: "timeouts.request_secs",
        });
    }

    let protocol = &config.protocol;
    for (field, value) in [
        ("protocol.base_path", &protocol.base_path),
        ("protocol.service_path", &protocol.service_path),
    ] {
        if !value.starts_with('/') {
            errors.push(ValidationError::PathPrefix {
                field,
                value: value.clone(),
            });
        }
    }
    for (field, value) in [
        ("protocol.affinity_cookie", &protocol.affinity_cookie),
        ("protocol.node_name", &protocol.node_name),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::Empty { field });
        } else if !is_cookie_safe(value) {
            errors.push(ValidationError::CookieCharacters {
                field,
                value: value.clone(),
            });
        }
    }
    if protocol.max_body_bytes == 0 {
        errors.push(ValidationError::NotPositive {
            field: "protocol.max_body_bytes",
        });
    }
    if protocol.views.is_empty() {
        errors.push(ValidationError::Empty { field: "protocol.views" });
    }
    for view in &protocol.views {
        if view.is_empty() || view.contains('/') {
            errors.push(ValidationError::ViewName(view.clone()));
        }
    }

    if config.client.session_open_timeout_ms == 0 {
        errors.push(ValidationError::NotPositive {
            field: "client.session_open_timeout_ms",
        });
    }
    if config.client.session_open_attempts == 0 {
        errors.push(ValidationError::NotPositive {
            field: "client.session_open_attempts",
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
