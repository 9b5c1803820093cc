//! Dynamic route gateway library.
//!
//! Keeps a gateway route table in sync with a remote config store and
//! resolves requests against it.

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;
pub mod store;

// Management surface
pub mod admin;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use config::watcher::ConfigWatcher;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use routing::{RouteDefinition, RouteLocator, RouteService, RouteTable};
