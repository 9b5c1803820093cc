//! Shared utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use tokio::sync::broadcast;

use dynamic_gateway::http::AppState;
use dynamic_gateway::routing::{RefreshEvent, RouteLocator, RouteService, RouteTable};

/// Table, service and locator wired the way `main` wires them.
pub struct Gateway {
    pub table: Arc<RouteTable>,
    pub service: Arc<RouteService>,
    pub locator: Arc<RouteLocator>,
}

impl Gateway {
    pub fn new() -> Self {
        let table = Arc::new(RouteTable::default());
        let service = Arc::new(RouteService::new(table.clone()));
        let locator = Arc::new(RouteLocator::new(table.clone()));
        Self {
            table,
            service,
            locator,
        }
    }

    #[allow(dead_code)]
    pub fn state(&self) -> AppState {
        AppState::new(self.locator.clone(), self.service.clone())
    }
}

/// Wait for the next refresh signal, failing the test after five seconds.
#[allow(dead_code)]
pub async fn next_refresh(rx: &mut broadcast::Receiver<RefreshEvent>) -> RefreshEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for refresh signal")
        .expect("refresh channel closed")
}

/// Poll `check` until it holds, failing the test after five seconds.
#[allow(dead_code)]
pub async fn eventually<F: Fn() -> bool>(check: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// GET request with an optional `entId` query parameter.
#[allow(dead_code)]
pub fn request_for(ent_id: Option<&str>) -> Request<Body> {
    let uri = match ent_id {
        Some(id) => format!("/orders?entId={}", id),
        None => "/orders".to_string(),
    };
    Request::get(uri).body(Body::empty()).unwrap()
}
