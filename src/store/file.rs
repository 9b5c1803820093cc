//! Directory-backed config store.
//!
//! Each key maps to `<root>/<group>/<data_id>`. Change notifications come
//! from the `notify` crate watching the group directory, so editors that
//! save through a rename are picked up too.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::store::{ConfigKey, ConfigStore, ConfigUpdates, StoreError};

/// A config store reading payload files from disk.
#[derive(Clone)]
pub struct FileConfigStore {
    root: PathBuf,
    watchers: Arc<Mutex<Vec<RecommendedWatcher>>>,
}

impl FileConfigStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            watchers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// File holding the payload for `key`.
    pub fn path_for(&self, key: &ConfigKey) -> PathBuf {
        self.root.join(&key.group).join(&key.data_id)
    }

    /// Stop every file watcher. Open subscriptions stop receiving updates.
    pub fn unwatch_all(&self) {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(count = watchers.len(), "Dropping config file watchers");
        watchers.clear();
    }
}

impl std::fmt::Debug for FileConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn get_config(&self, key: &ConfigKey, timeout: Duration) -> Result<String, StoreError> {
        let path = self.path_for(key);
        match tokio::time::timeout(timeout, tokio::fs::read_to_string(&path)).await {
            Err(_) => Err(StoreError::Timeout(timeout)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.clone()))
            }
            Ok(Err(e)) => Err(StoreError::Io(e)),
            Ok(Ok(content)) => Ok(content),
        }
    }

    async fn subscribe(&self, key: &ConfigKey) -> Result<ConfigUpdates, StoreError> {
        let path = self.path_for(key);
        let dir = self.root.join(&key.group);
        tokio::fs::create_dir_all(&dir).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let last_sent: Arc<Mutex<Option<String>>> = Arc::default();
        let seen = last_sent.clone();
        let notify_tx = tx.clone();
        let target = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    if !event.paths.iter().any(|p| p.file_name() == target.file_name()) {
                        return;
                    }
                    let content = match std::fs::read_to_string(&target) {
                        Ok(content) => content,
                        Err(e) => {
                            tracing::warn!(path = ?target, error = %e, "Failed to read changed config file");
                            return;
                        }
                    };
                    // Truncated mid-write; the next event carries the content
                    if content.trim().is_empty() {
                        return;
                    }

                    if push_if_changed(&seen, &notify_tx, content) {
                        tracing::info!(path = ?target, "Config file change detected");
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(watcher);

        // Replay what is on disk now, covering edits made before the watch began
        if let Ok(content) = tokio::fs::read_to_string(&path).await {
            if !content.trim().is_empty() {
                push_if_changed(&last_sent, &tx, content);
            }
        }

        tracing::info!(path = ?path, key = %key, "Config file watcher started");
        Ok(rx)
    }
}

/// Send `content` unless it equals the last payload sent. Returns true if sent.
fn push_if_changed(
    last_sent: &Mutex<Option<String>>,
    tx: &mpsc::UnboundedSender<String>,
    content: String,
) -> bool {
    let mut last = last_sent.lock().unwrap_or_else(PoisonError::into_inner);
    if last.as_deref() == Some(content.as_str()) {
        return false;
    }
    *last = Some(content.clone());
    if tx.send(content).is_err() {
        tracing::debug!("Config subscriber gone, dropping update");
    }
    true
}
