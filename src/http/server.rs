//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the resolve handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and drain on shutdown
//! - Resolve each request against the current route snapshot

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::routing::{FilterDefinition, RouteLocator, RouteService};
use crate::store::ConfigKey;

/// Response header naming the matched route.
pub const X_GATEWAY_ROUTE: HeaderName = HeaderName::from_static("x-gateway-route");

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub locator: Arc<RouteLocator>,
    pub service: Arc<RouteService>,
    /// Config entry routes are loaded from, if any.
    pub source: Option<ConfigKey>,
}

impl AppState {
    pub fn new(locator: Arc<RouteLocator>, service: Arc<RouteService>) -> Self {
        Self {
            locator,
            service,
            source: None,
        }
    }

    pub fn with_source(mut self, key: ConfigKey) -> Self {
        self.source = Some(key);
        self
    }
}

/// What the gateway resolved a request to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedRoute<'a> {
    route_id: &'a str,
    uri: &'a str,
    filters: &'a [FilterDefinition],
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: &'a BTreeMap<String, serde_json::Value>,
}

/// Gateway HTTP server.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(state: AppState, request_timeout: Duration) -> Self {
        Self {
            router: gateway_router(state, request_timeout),
        }
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listener started");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!(address = %addr, "Gateway listener stopped");
        Ok(())
    }
}

/// Build the gateway router with all middleware layers.
#[allow(deprecated)]
pub fn gateway_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", any(resolve_handler))
        .route("/{*path}", any(resolve_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

async fn resolve_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let Some(route) = state.locator.match_request(&request) else {
        tracing::debug!(
            request_id = %request_id(&request),
            method = %request.method(),
            path = %request.uri().path(),
            "No route matched"
        );
        let body = serde_json::json!({
            "error": "no route matched",
            "path": request.uri().path(),
        });
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    };

    tracing::debug!(
        request_id = %request_id(&request),
        route_id = %route.id(),
        uri = %route.uri(),
        "Route resolved"
    );

    let definition = route.definition();
    let mut response = Json(ResolvedRoute {
        route_id: route.id(),
        uri: route.uri(),
        filters: &definition.filters,
        metadata: &definition.metadata,
    })
    .into_response();

    if let Ok(value) = HeaderValue::from_str(route.id()) {
        response.headers_mut().insert(X_GATEWAY_ROUTE, value);
    }
    response
}
