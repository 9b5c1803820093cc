//! Routing error types.

use thiserror::Error;

/// A route payload could not be decoded. The whole payload is discarded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("route payload is empty")]
    Empty,

    #[error("malformed route payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A predicate could not be built from its definition.
#[derive(Debug, Error)]
pub enum PredicateError {
    /// No constructor registered under this name.
    #[error("unknown predicate `{0}`")]
    Unknown(String),

    /// The `args` map does not fit the predicate's config.
    #[error("invalid config for predicate `{name}`: {reason}")]
    InvalidConfig { name: String, reason: String },
}

impl PredicateError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A route definition was rejected. Other routes in the same reload still apply.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route id must not be empty")]
    EmptyId,

    #[error("route `{0}` has no uri")]
    EmptyUri(String),

    #[error("route `{id}`: {source}")]
    Predicate {
        id: String,
        #[source]
        source: PredicateError,
    },
}

impl RouteError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteError::EmptyId => "empty_id",
            RouteError::EmptyUri(_) => "empty_uri",
            RouteError::Predicate { .. } => "predicate",
        }
    }
}
