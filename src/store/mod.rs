//! Remote configuration stores.
//!
//! # Data Flow
//! ```text
//! get_config(key, timeout)  → full payload (point read)
//! subscribe(key)            → ConfigUpdates (one full payload per change)
//!
//! Implementations:
//!     memory.rs  in-process, `publish` drives notifications
//!     file.rs    <root>/<group>/<data_id>, notify-based change events
//!     nacos.rs   Nacos open API, interval polling with change detection
//! ```
//!
//! # Design Decisions
//! - Stores always deliver the complete configuration, never a diff
//! - Notifiers only enqueue; decoding happens on the consumer's task
//! - Dropping the `ConfigUpdates` receiver ends the subscription

pub mod file;
pub mod memory;
pub mod nacos;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::schema::{RouteSourceConfig, StoreKind};

pub use file::FileConfigStore;
pub use memory::MemoryConfigStore;
pub use nacos::NacosConfigStore;

/// Stream of full payloads for one key.
pub type ConfigUpdates = mpsc::UnboundedReceiver<String>;

/// Address of a configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    pub data_id: String,
    pub group: String,
}

impl ConfigKey {
    pub fn new(data_id: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            data_id: data_id.into(),
            group: group.into(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.data_id, self.group)
    }
}

/// Errors raised by config stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("config `{0}` not found")]
    NotFound(ConfigKey),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("config server returned status {0}")]
    Status(u16),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("invalid store address `{0}`")]
    InvalidAddress(String),
}

/// A key-addressed configuration source with change notifications.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Point read of the current payload.
    async fn get_config(&self, key: &ConfigKey, timeout: Duration) -> Result<String, StoreError>;

    /// Register for change notifications on `key`.
    ///
    /// Each received item is the complete new payload. Items are sent from a
    /// store-owned thread or task; the receiver decides where they are handled.
    async fn subscribe(&self, key: &ConfigKey) -> Result<ConfigUpdates, StoreError>;
}

/// Build the store selected by the route source config.
///
/// Returns `None` when dynamic routes are disabled.
pub fn build_store(config: &RouteSourceConfig) -> Result<Option<Arc<dyn ConfigStore>>, StoreError> {
    let store: Arc<dyn ConfigStore> = match config.kind {
        StoreKind::None => return Ok(None),
        StoreKind::File => Arc::new(FileConfigStore::new(&config.directory)),
        StoreKind::Nacos => Arc::new(NacosConfigStore::new(
            &config.server_addr,
            config.namespace.clone(),
            Duration::from_millis(config.poll_interval_ms),
        )?),
    };
    tracing::info!(kind = ?config.kind, "Config store initialized");
    Ok(Some(store))
}
