//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Reload path:
//!     RouteDefinition[] (decoded payload)
//!     → service.rs (sole write path)
//!     → table.rs (compile predicates, build snapshot off to the side, swap)
//!     → RefreshEvent broadcast
//!     → router.rs (locator re-reads snapshot)
//!
//! Request path:
//!     Incoming Request (host, path, headers, query)
//!     → router.rs (current snapshot)
//!     → matcher.rs (evaluate compiled predicates, AND)
//!     → Return: matched Route or NoMatch
//! ```
//!
//! # Design Decisions
//! - Predicates compiled at load time; bad configs never reach the request path
//! - Snapshots are immutable; reloads replace them whole
//! - Deterministic: first match by `order`, then table order

pub mod definition;
pub mod error;
pub mod matcher;
pub mod predicate;
pub mod router;
pub mod service;
pub mod table;

pub use definition::{decode_routes, ConfigSnapshot, FilterDefinition, PredicateDefinition, RouteDefinition};
pub use error::{DecodeError, PredicateError, RouteError};
pub use matcher::Matcher;
pub use predicate::PredicateRegistry;
pub use router::RouteLocator;
pub use service::{RefreshEvent, RouteService};
pub use table::{ReloadReport, Route, RouteSnapshot, RouteTable};
