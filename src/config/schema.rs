//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tunnel
//! server and client. All types derive Serde traits for deserialization from
//! config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TunnelConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Wire protocol settings shared by server and client.
    pub protocol: ProtocolConfig,

    /// Client-side behaviour.
    pub client: ClientConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum requests handled at once (backpressure).
    pub max_concurrent_requests: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_concurrent_requests: 1024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Wire protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Fixed base path of all protocol services. The affinity cookie is scoped to it.
    pub base_path: String,

    /// Path of the invocation service below `base_path`.
    pub service_path: String,

    /// Name of the affinity cookie.
    pub affinity_cookie: String,

    /// Route name of this node, appended to synthesized affinity tokens.
    pub node_name: String,

    /// Maximum request or response body size in bytes.
    pub max_body_bytes: usize,

    /// View types this deployment exposes.
    pub views: Vec<String>,
}

impl ProtocolConfig {
    /// `base_path` + `service_path`, e.g. `/wildfly-services/ejb`.
    pub fn service_root(&self) -> String {
        format!(
            "{}{}",
            self.base_path.trim_end_matches('/'),
            self.service_path.trim_end_matches('/')
        )
    }
}

/// View exposed when the config names none.
pub const DEFAULT_VIEW: &str = "com.example.FooRemote";

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            base_path: "/wildfly-services".to_string(),
            service_path: "/ejb".to_string(),
            affinity_cookie: "JSESSIONID".to_string(),
            node_name: "node1".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            views: vec![DEFAULT_VIEW.to_string()],
        }
    }
}

/// Client-side behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long to wait for a session to open, in milliseconds.
    pub session_open_timeout_ms: u64,

    /// Attempts made by `create_session_with_retry`.
    pub session_open_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl ClientConfig {
    pub fn session_open_timeout(&self) -> Duration {
        Duration::from_millis(self.session_open_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session_open_timeout_ms: 5_000,
            session_open_attempts: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 2_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
