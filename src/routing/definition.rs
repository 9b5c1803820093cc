//! Route definition model exchanged with the config store.
//!
//! # Payload Format
//! ```text
//! [
//!   {
//!     "id": "path1",
//!     "uri": "lb://service-a1",
//!     "order": 0,
//!     "predicates": [{ "name": "EntIdCheck", "args": { "entId": "1,2" } }],
//!     "filters": []
//!   }
//! ]
//! ```
//!
//! # Design Decisions
//! - A payload is all-or-nothing: one malformed element rejects the payload
//! - `id` is required by the decoder; emptiness is checked at compile time
//! - Filters are opaque and passed through untouched

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routing::error::DecodeError;
use crate::store::ConfigKey;

/// Arguments of a predicate or filter definition.
pub type Args = BTreeMap<String, String>;

/// A single route as delivered by the config store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDefinition {
    /// Unique key within a route table.
    pub id: String,

    /// Upstream target understood by the dispatcher (e.g. `lb://svc-a`).
    #[serde(default)]
    pub uri: String,

    /// Request conditions, ANDed.
    #[serde(default)]
    pub predicates: Vec<PredicateDefinition>,

    /// Request/response transformations, opaque to this crate.
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,

    /// Resolution precedence (lower first).
    #[serde(default)]
    pub order: i32,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl RouteDefinition {
    /// Create a definition with no predicates or filters.
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            predicates: Vec::new(),
            filters: Vec::new(),
            order: 0,
            metadata: BTreeMap::new(),
        }
    }

    /// Append a predicate.
    pub fn with_predicate(mut self, predicate: PredicateDefinition) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Append a filter.
    pub fn with_filter(mut self, filter: FilterDefinition) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

/// A named, parameterized request condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateDefinition {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_args")]
    pub args: Args,
}

impl PredicateDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Args::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// A named filter; carried for the dispatcher, never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_args")]
    pub args: Args,
}

impl FilterDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Args::new(),
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// Accepts scalar JSON values and stores them as strings.
///
/// Config stores are edited by hand; `{"entId": 9}` and `{"entId": "9"}`
/// must mean the same thing.
fn deserialize_args<'de, D>(deserializer: D) -> Result<Args, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut args = Args::new();
    for (key, value) in raw.unwrap_or_default() {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            other => {
                return Err(de::Error::custom(format!(
                    "argument `{}` must be a scalar, got {}",
                    key, other
                )))
            }
        };
        args.insert(key, value);
    }
    Ok(args)
}

/// Raw payload fetched from the config store, with its coordinates.
///
/// Lives only until it is decoded.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub key: ConfigKey,
    pub payload: String,
}

impl ConfigSnapshot {
    pub fn new(key: ConfigKey, payload: impl Into<String>) -> Self {
        Self {
            key,
            payload: payload.into(),
        }
    }

    /// Decode the payload into route definitions.
    pub fn decode(&self) -> Result<Vec<RouteDefinition>, DecodeError> {
        decode_routes(&self.payload)
    }
}

impl fmt::Display for ConfigSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.key, self.payload.len())
    }
}

/// Decode a JSON route list.
pub fn decode_routes(payload: &str) -> Result<Vec<RouteDefinition>, DecodeError> {
    if payload.trim().is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_str(payload)?)
}
