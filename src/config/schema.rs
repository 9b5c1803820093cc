//! Configuration schema definitions.
//!
//! This module defines the gateway's own configuration (listeners, the
//! remote route source, observability) and the bootstrap routes. All types
//! derive Serde traits for deserialization from the TOML config file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::routing::RouteDefinition;
use crate::store::ConfigKey;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway listener (route resolution endpoint).
    pub listener: ListenerConfig,

    /// Where dynamic routes come from.
    pub route_source: RouteSourceConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Routes added before the route source is consulted.
    pub routes: Vec<RouteDefinition>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Kind of remote config store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Nacos config server.
    Nacos,
    /// Directory of payload files.
    File,
    /// Static routes only.
    #[default]
    None,
}

/// Remote route source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteSourceConfig {
    pub kind: StoreKind,

    /// Config entry holding the route list.
    pub data_id: String,

    pub group: String,

    /// Bound on the initial fetch, in milliseconds.
    pub fetch_timeout_ms: u64,

    /// Nacos server address (`host:port` or base URL).
    pub server_addr: String,

    /// Nacos namespace (tenant); empty means the public namespace.
    pub namespace: Option<String>,

    /// Nacos change polling interval, in milliseconds.
    pub poll_interval_ms: u64,

    /// Root directory for the file store.
    pub directory: String,
}

impl RouteSourceConfig {
    pub fn key(&self) -> ConfigKey {
        ConfigKey::new(&self.data_id, &self.group)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for RouteSourceConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::None,
            data_id: "gateway-routes".to_string(),
            group: "DEFAULT_GROUP".to_string(),
            fetch_timeout_ms: 30_000,
            server_addr: "127.0.0.1:8848".to_string(),
            namespace: None,
            poll_interval_ms: 3_000,
            directory: "./routes".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
