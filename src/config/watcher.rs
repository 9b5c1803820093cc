//! Route config watcher for hot reload.
//!
//! # Responsibilities
//! - Fetch the route list once at startup, bounded by the fetch timeout
//! - Subscribe to the store and apply every pushed payload
//! - Keep the last-known-good table when a payload does not decode
//!
//! # Design Decisions
//! - Startup failures (timeout, store error, bad payload) are logged and
//!   swallowed; the gateway starts with whatever routes it already has
//! - Only a failed subscription is returned to the caller of `start`;
//!   `start_or_retry` logs it and keeps resubscribing with backoff
//! - Payloads queued while a reload runs are coalesced; only the newest is
//!   applied since each one is a full replacement

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::observability::metrics;
use crate::resilience::poll_backoff;
use crate::routing::{ConfigSnapshot, ReloadReport, RouteService};
use crate::store::{ConfigKey, ConfigStore, ConfigUpdates, StoreError};

/// Default bound on the initial fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const SUBSCRIBE_RETRY_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SUBSCRIBE_BACKOFF: Duration = Duration::from_secs(60);

/// Keeps a [`RouteService`] in sync with one config entry.
pub struct ConfigWatcher {
    store: Arc<dyn ConfigStore>,
    service: Arc<RouteService>,
    fetch_timeout: Duration,
}

impl ConfigWatcher {
    pub fn new(store: Arc<dyn ConfigStore>, service: Arc<RouteService>) -> Self {
        Self {
            store,
            service,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Load the current routes, then watch for changes until `shutdown`.
    ///
    /// Returns once the subscription is registered. Updates are applied on
    /// a background task owned by the returned handle.
    pub async fn start(
        &self,
        key: ConfigKey,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<WatchHandle, StoreError> {
        tracing::info!(key = %key, timeout = ?self.fetch_timeout, "Initializing gateway routes");

        self.initial_load(&key).await;

        let updates = self.store.subscribe(&key).await.map_err(|e| {
            tracing::error!(key = %key, error = %e, "Failed to subscribe to route config");
            e
        })?;

        let task = tokio::spawn(watch_loop(self.service.clone(), key.clone(), updates, shutdown));
        tracing::info!(key = %key, routes = self.service.snapshot().len(), "Route config watcher started");

        Ok(WatchHandle { key, task })
    }

    /// Like [`ConfigWatcher::start`], but a failed subscription is not returned.
    ///
    /// It is logged and retried in the background with backoff until it
    /// succeeds or `shutdown` fires. Meanwhile the table keeps whatever routes
    /// it already has.
    pub async fn start_or_retry(&self, key: ConfigKey, shutdown: broadcast::Receiver<()>) -> WatchHandle {
        tracing::info!(key = %key, timeout = ?self.fetch_timeout, "Initializing gateway routes");

        self.initial_load(&key).await;

        let service = self.service.clone();
        let task = match self.store.subscribe(&key).await {
            Ok(updates) => {
                tracing::info!(key = %key, routes = service.snapshot().len(), "Route config watcher started");
                tokio::spawn(watch_loop(service, key.clone(), updates, shutdown))
            }
            Err(e) => {
                metrics::record_subscribe_failure();
                tracing::error!(
                    key = %key,
                    error = %e,
                    routes = service.snapshot().len(),
                    "Failed to subscribe to route config, serving current routes and retrying"
                );
                tokio::spawn(resubscribe(self.store.clone(), service, key.clone(), shutdown))
            }
        };

        WatchHandle { key, task }
    }

    async fn initial_load(&self, key: &ConfigKey) -> Option<ReloadReport> {
        let fetch = self.store.get_config(key, self.fetch_timeout);
        match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(Ok(payload)) => {
                metrics::record_config_fetch("ok");
                tracing::debug!(key = %key, bytes = payload.len(), "Fetched initial route config");
                apply_snapshot(&self.service, ConfigSnapshot::new(key.clone(), payload))
            }
            Ok(Err(e)) => {
                metrics::record_config_fetch("error");
                tracing::warn!(key = %key, error = %e, "Initial route config fetch failed");
                None
            }
            Err(_) => {
                metrics::record_config_fetch("timeout");
                tracing::warn!(key = %key, timeout = ?self.fetch_timeout, "Initial route config fetch timed out");
                None
            }
        }
    }
}

/// Decode a payload and, if it decodes, replace the whole table with it.
///
/// Returns `None` when the payload was discarded.
pub fn apply_snapshot(service: &RouteService, snapshot: ConfigSnapshot) -> Option<ReloadReport> {
    match snapshot.decode() {
        Ok(definitions) => {
            let report = service.replace_all(definitions);
            metrics::record_reload(if report.is_clean() { "applied" } else { "partial" });
            tracing::info!(
                key = %snapshot.key,
                version = report.version,
                applied = report.applied,
                rejected = report.rejected.len(),
                "Route table reloaded"
            );
            Some(report)
        }
        Err(e) => {
            metrics::record_reload("decode_error");
            tracing::error!(
                key = %snapshot.key,
                error = %e,
                "Discarding undecodable route config, keeping current routes"
            );
            None
        }
    }
}

async fn resubscribe(
    store: Arc<dyn ConfigStore>,
    service: Arc<RouteService>,
    key: ConfigKey,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut failures = 1u32;
    let updates = loop {
        let delay = poll_backoff(failures, SUBSCRIBE_RETRY_INTERVAL, MAX_SUBSCRIBE_BACKOFF);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.recv() => {
                tracing::info!(key = %key, "Route config watcher stopping before subscribing");
                return;
            }
        }

        match store.subscribe(&key).await {
            Ok(updates) => break updates,
            Err(e) => {
                failures = failures.saturating_add(1);
                metrics::record_subscribe_failure();
                tracing::warn!(key = %key, failures, error = %e, "Route config subscription retry failed");
            }
        }
    };

    tracing::info!(key = %key, failures, "Subscribed to route config after retrying");
    watch_loop(service, key, updates, shutdown).await;
}

async fn watch_loop(
    service: Arc<RouteService>,
    key: ConfigKey,
    mut updates: ConfigUpdates,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            received = updates.recv() => {
                let Some(mut payload) = received else {
                    tracing::warn!(key = %key, "Config store closed the subscription");
                    break;
                };

                let mut superseded = 0usize;
                while let Ok(newer) = updates.try_recv() {
                    payload = newer;
                    superseded += 1;
                }
                if superseded > 0 {
                    tracing::debug!(key = %key, superseded, "Skipped superseded route payloads");
                }

                tracing::info!(key = %key, bytes = payload.len(), "Route config change received");
                apply_snapshot(&service, ConfigSnapshot::new(key.clone(), payload));
            }
            _ = shutdown.recv() => {
                tracing::info!(key = %key, "Route config watcher stopping");
                break;
            }
        }
    }
}

/// Handle to a running watch task.
#[derive(Debug)]
pub struct WatchHandle {
    key: ConfigKey,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the watch task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!(key = %self.key, error = %e, "Route config watcher panicked");
            }
        }
    }
}
