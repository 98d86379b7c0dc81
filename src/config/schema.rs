//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root settings for the proxy, before the secret is resolved.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Listener configuration (bind address, port).
    pub listener: ListenerConfig,

    /// Upstream target and secret source.
    pub upstream: UpstreamConfig,

    /// Body relay tuning.
    pub relay: RelayConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host or IP to bind to.
    pub bind: String,

    /// TCP port to listen on.
    pub port: u16,

    /// How long open streams may keep running after shutdown is requested.
    pub drain_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            drain_timeout_secs: 10,
        }
    }
}

impl ListenerConfig {
    /// `host:port` form used for binding and logging.
    pub fn address(&self) -> String {
        if self.bind.contains(':') && !self.bind.starts_with('[') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }
}

/// Upstream configuration.
///
/// A literal secret is deliberately absent here: it can only be passed on the
/// command line (see [`SecretSources`]).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Absolute base URL of the upstream (e.g. `https://api.openai.com`).
    pub target: Option<String>,

    /// File holding the upstream secret.
    pub secret_file: Option<PathBuf>,

    /// Opt-in bound on connection establishment, in seconds.
    pub connect_timeout_secs: Option<u64>,
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Opt-in cap on buffered bytes of a single unterminated line.
    /// `None` buffers until newline or end of body.
    pub max_line_bytes: Option<usize>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Prometheus endpoint bind address. Metrics are not exported when unset.
    pub metrics_address: Option<String>,
}

/// Every place a secret may come from, as given by the operator.
#[derive(Debug, Clone, Default)]
pub struct SecretSources {
    pub literal: Option<String>,
    pub file: Option<PathBuf>,
    pub stdin: bool,
}
