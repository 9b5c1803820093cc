//! Route mutation façade.
//!
//! # Responsibilities
//! - Sole write path into the route table (watcher, bootstrap, admin API)
//! - Publish a refresh signal after every change
//!
//! # Refresh Contract
//! - `add`: one signal on success, none on failure
//! - `delete_all`: one signal if anything was removed
//! - `replace_all`: exactly one signal per call
//!
//! Signals are fire-and-forget; consumers re-read the table and must
//! tolerate redundant signals.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::observability::metrics;
use crate::routing::definition::RouteDefinition;
use crate::routing::error::RouteError;
use crate::routing::table::{ReloadReport, RouteSnapshot, RouteTable};

const REFRESH_CHANNEL_CAPACITY: usize = 64;

/// "Routes changed" notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshEvent {
    /// Version of the snapshot that triggered the signal.
    pub version: u64,
}

/// Validates and stores route definitions, then signals the dispatcher.
#[derive(Debug)]
pub struct RouteService {
    table: Arc<RouteTable>,
    refresh_tx: broadcast::Sender<RefreshEvent>,
}

impl RouteService {
    pub fn new(table: Arc<RouteTable>) -> Self {
        let (refresh_tx, _) = broadcast::channel(REFRESH_CHANNEL_CAPACITY);
        Self { table, refresh_tx }
    }

    /// Read access for dispatchers.
    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.table.snapshot()
    }

    /// Subscribe to refresh signals.
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.refresh_tx.subscribe()
    }

    /// Add or overwrite a single route.
    pub fn add(&self, definition: RouteDefinition) -> Result<u64, RouteError> {
        let id = definition.id.clone();
        match self.table.add_route(definition) {
            Ok(version) => {
                tracing::info!(route_id = %id, version, "Route added");
                self.publish(version);
                Ok(version)
            }
            Err(e) => {
                tracing::warn!(route_id = %id, error = %e, "Route rejected");
                metrics::record_route_rejected(e.kind());
                Err(e)
            }
        }
    }

    /// Remove every route. Returns the published version, or `None` if the
    /// table was already empty.
    pub fn delete_all(&self) -> Option<u64> {
        let Some(version) = self.table.clear_all() else {
            tracing::debug!("Route table already empty");
            return None;
        };
        tracing::info!(version, "All routes deleted");
        self.publish(version);
        Some(version)
    }

    /// Replace the whole table; invalid routes are logged and skipped.
    pub fn replace_all(&self, definitions: Vec<RouteDefinition>) -> ReloadReport {
        let report = self.table.replace_all(definitions);

        for rejected in &report.rejected {
            tracing::warn!(
                route_id = %rejected.id,
                error = %rejected.error,
                "Skipping invalid route"
            );
            metrics::record_route_rejected(rejected.error.kind());
        }
        tracing::info!(
            version = report.version,
            applied = report.applied,
            rejected = report.rejected.len(),
            "Route table replaced"
        );

        self.publish(report.version);
        report
    }

    fn publish(&self, version: u64) {
        metrics::set_active_routes(self.table.snapshot().len());
        metrics::record_refresh_signal();
        // No subscribers is fine; nobody is dispatching yet.
        let _ = self.refresh_tx.send(RefreshEvent { version });
    }
}
