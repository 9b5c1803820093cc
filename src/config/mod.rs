//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway config (TOML, read once at startup)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig
//!
//! Route config (remote store, continuously):
//!     watcher.rs initial fetch (bounded) + subscription
//!     → ConfigSnapshot::decode
//!     → RouteService::replace_all
//!     → RefreshEvent to every subscriber
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A route payload that fails to decode never touches the table

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{GatewayConfig, RouteSourceConfig, StoreKind};
pub use watcher::ConfigWatcher;
