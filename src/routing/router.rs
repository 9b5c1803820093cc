//! Dispatcher-side route lookup.
//!
//! # Responsibilities
//! - Hold the snapshot the dispatcher currently routes with
//! - Re-read the table on every refresh signal
//! - Look up the matching route for a request, or explicit no-match
//!
//! # Design Decisions
//! - Read-only: the locator never mutates the table
//! - Refresh handling is idempotent; a lagged receiver simply re-reads
//! - Lookups are lock-free and never wait on a reload

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::Request;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::observability::metrics;
use crate::routing::service::RefreshEvent;
use crate::routing::table::{Route, RouteSnapshot, RouteTable};

/// The dispatcher's view of the route table.
#[derive(Debug)]
pub struct RouteLocator {
    table: Arc<RouteTable>,
    current: ArcSwap<RouteSnapshot>,
}

impl RouteLocator {
    pub fn new(table: Arc<RouteTable>) -> Self {
        let current = ArcSwap::new(table.snapshot());
        Self { table, current }
    }

    /// Pick up the table's latest snapshot. Returns its version.
    pub fn refresh(&self) -> u64 {
        let snapshot = self.table.snapshot();
        let version = snapshot.version();
        self.current.store(snapshot);
        version
    }

    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version()
    }

    /// Resolve a request against the current snapshot.
    pub fn match_request(&self, req: &Request<Body>) -> Option<Arc<Route>> {
        let snapshot = self.current.load();
        let route = snapshot.match_request(req).cloned();
        metrics::record_resolution(route.is_some());
        route
    }

    /// Follow refresh signals until shutdown or until the publisher goes away.
    pub async fn run(
        self: Arc<Self>,
        mut refresh: broadcast::Receiver<RefreshEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        // Anything published before we subscribed
        self.refresh();

        loop {
            tokio::select! {
                event = refresh.recv() => match event {
                    Ok(RefreshEvent { version }) => {
                        let current = self.refresh();
                        tracing::debug!(signalled = version, current, "Route locator refreshed");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        let current = self.refresh();
                        tracing::debug!(skipped, current, "Route locator lagged, refreshed");
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Refresh channel closed, route locator stopping");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Route locator received shutdown signal");
                    break;
                }
            }
        }
    }
}
