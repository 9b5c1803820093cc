//! In-process config store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::store::{ConfigKey, ConfigStore, ConfigUpdates, StoreError};

/// A config store held in memory.
///
/// `publish` plays the role of the remote server: it updates the stored
/// payload and notifies every live subscriber on the caller's thread.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    configs: Arc<DashMap<ConfigKey, String>>,
    listeners: Arc<DashMap<ConfigKey, Vec<mpsc::UnboundedSender<String>>>>,
    fetch_delay: Option<Duration>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `get_config` call, e.g. to exercise fetch timeouts.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Store a payload without notifying anyone.
    pub fn set(&self, key: &ConfigKey, payload: impl Into<String>) {
        self.configs.insert(key.clone(), payload.into());
    }

    /// Store a payload and push it to subscribers. Returns how many were notified.
    pub fn publish(&self, key: &ConfigKey, payload: impl Into<String>) -> usize {
        let payload = payload.into();
        self.configs.insert(key.clone(), payload.clone());

        let Some(mut senders) = self.listeners.get_mut(key) else {
            return 0;
        };
        senders.retain(|tx| tx.send(payload.clone()).is_ok());
        senders.len()
    }

    pub fn remove(&self, key: &ConfigKey) -> Option<String> {
        self.configs.remove(key).map(|(_, v)| v)
    }

    /// Live subscribers for `key`.
    pub fn listener_count(&self, key: &ConfigKey) -> usize {
        self.listeners
            .get(key)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_config(&self, key: &ConfigKey, _timeout: Duration) -> Result<String, StoreError> {
        // The delay ignores `timeout`; callers are expected to bound the call.
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.configs
            .get(key)
            .map(|v| v.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn subscribe(&self, key: &ConfigKey) -> Result<ConfigUpdates, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.entry(key.clone()).or_default().push(tx);
        Ok(rx)
    }
}
