//! Admin API for inspecting and editing the live route table.
//!
//! # Responsibilities
//! - Report gateway and route table status
//! - List, add, replace, and delete routes at runtime
//!
//! # Design Decisions
//! - Mutations go through RouteService so they publish refresh signals
//! - `PUT /admin/routes` takes the same payload format as the config store
//! - Listens on its own address, loopback by default

pub mod handlers;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::http::server::AppState;
use crate::lifecycle::Shutdown;
use self::handlers::*;

pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route(
            "/admin/routes",
            get(list_routes)
                .post(add_route)
                .put(replace_routes)
                .delete(delete_routes),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve_admin(
    listener: TcpListener,
    state: AppState,
    shutdown: Shutdown,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, admin_router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    tracing::info!(address = %addr, "Admin API stopped");
    Ok(())
}
