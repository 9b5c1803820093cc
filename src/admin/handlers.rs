use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::{decode_routes, DecodeError, RouteDefinition, RouteError};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub route_version: u64,
    pub routes: usize,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RouteList {
    pub version: u64,
    pub routes: Vec<RouteDefinition>,
}

#[derive(Debug, Serialize)]
pub struct Mutation {
    pub version: u64,
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct Rejection {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ReplaceSummary {
    pub version: u64,
    pub applied: usize,
    pub rejected: Vec<Rejection>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let snapshot = state.service.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        route_version: snapshot.version(),
        routes: snapshot.len(),
        source: state.source.as_ref().map(ToString::to_string),
    })
}

pub async fn list_routes(State(state): State<AppState>) -> Json<RouteList> {
    let snapshot = state.service.snapshot();
    Json(RouteList {
        version: snapshot.version(),
        routes: snapshot.routes().map(|r| r.definition().clone()).collect(),
    })
}

pub async fn add_route(
    State(state): State<AppState>,
    Json(definition): Json<RouteDefinition>,
) -> Result<Json<Mutation>, AdminError> {
    metrics::record_admin_request("add");
    let id = definition.id.clone();
    let version = state.service.add(definition)?;
    tracing::info!(route_id = %id, version, "Route added via admin API");
    Ok(Json(Mutation { version, changed: true }))
}

/// Body is a raw route list payload, decoded like a config store push.
pub async fn replace_routes(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ReplaceSummary>, AdminError> {
    metrics::record_admin_request("replace");
    let definitions = decode_routes(&body)?;
    let report = state.service.replace_all(definitions);
    tracing::info!(version = report.version, applied = report.applied, "Routes replaced via admin API");

    Ok(Json(ReplaceSummary {
        version: report.version,
        applied: report.applied,
        rejected: report
            .rejected
            .into_iter()
            .map(|r| Rejection {
                id: r.id,
                error: r.error.to_string(),
            })
            .collect(),
    }))
}

pub async fn delete_routes(State(state): State<AppState>) -> Json<Mutation> {
    metrics::record_admin_request("delete");
    match state.service.delete_all() {
        Some(version) => {
            tracing::info!(version, "All routes deleted via admin API");
            Json(Mutation { version, changed: true })
        }
        None => Json(Mutation {
            version: state.service.snapshot().version(),
            changed: false,
        }),
    }
}
