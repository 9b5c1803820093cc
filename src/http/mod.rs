//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request id set and propagated)
//!     → RouteLocator::match_request (current route snapshot)
//!     → JSON description of the resolved route, or 404
//! ```
//!
//! Forwarding to the resolved upstream is left to the deployment in front
//! of or behind this listener.

pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{gateway_router, AppState, GatewayServer, X_GATEWAY_ROUTE};
