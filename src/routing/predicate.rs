//! Predicate registry.
//!
//! # Responsibilities
//! - Map predicate names to constructors
//! - Bind each constructor's typed config from the definition's `args`
//! - Reject unknown predicates and bad configs when a route is loaded
//!
//! # Design Decisions
//! - Constructors are plain functions `Config -> Matcher`, keyed by name
//! - Configs deny unknown keys; a typo fails the route, not the request
//! - Positional `_genkey_N` args are accepted where a kind has an obvious order

use std::collections::HashMap;
use std::fmt;

use axum::http::{HeaderName, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::routing::definition::{Args, PredicateDefinition};
use crate::routing::error::PredicateError;
use crate::routing::matcher::{
    AndMatcher, EntIdMatcher, HeaderMatcher, HostMatcher, Matcher, MethodMatcher, PathMatcher,
    QueryMatcher,
};

pub const ENT_ID_CHECK: &str = "EntIdCheck";
pub const PATH: &str = "Path";
pub const HOST: &str = "Host";
pub const HEADER: &str = "Header";
pub const QUERY: &str = "Query";
pub const METHOD: &str = "Method";

type Constructor = Box<dyn Fn(&Args) -> Result<Box<dyn Matcher>, PredicateError> + Send + Sync>;

/// Registry of named predicate constructors.
pub struct PredicateRegistry {
    constructors: HashMap<String, Constructor>,
}

impl PredicateRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// A registry with every built-in predicate kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(ENT_ID_CHECK, build_ent_id_check)
            .register(PATH, build_path)
            .register(HOST, build_host)
            .register(HEADER, build_header)
            .register(QUERY, build_query)
            .register(METHOD, build_method);
        registry
    }

    /// Register a constructor. A later registration under the same name wins.
    pub fn register<C, M, F>(&mut self, name: &str, build: F) -> &mut Self
    where
        C: DeserializeOwned + 'static,
        M: Matcher + 'static,
        F: Fn(C) -> Result<M, PredicateError> + Send + Sync + 'static,
    {
        let kind = name.to_string();
        let constructor: Constructor =
            Box::new(move |args: &Args| -> Result<Box<dyn Matcher>, PredicateError> {
                let config: C = bind_config(&kind, args)?;
                Ok(Box::new(build(config)?))
            });
        self.constructors.insert(name.to_string(), constructor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a single predicate.
    pub fn build(&self, definition: &PredicateDefinition) -> Result<Box<dyn Matcher>, PredicateError> {
        let constructor = self
            .constructors
            .get(&definition.name)
            .ok_or_else(|| PredicateError::Unknown(definition.name.clone()))?;
        constructor(&definition.args)
    }

    /// Build every predicate of a route, failing on the first bad one.
    pub fn compile(&self, definitions: &[PredicateDefinition]) -> Result<AndMatcher, PredicateError> {
        let matchers = definitions
            .iter()
            .map(|d| self.build(d))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AndMatcher::new(matchers))
    }
}

impl Default for PredicateRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("predicates", &self.names())
            .finish()
    }
}

fn bind_config<C: DeserializeOwned>(name: &str, args: &Args) -> Result<C, PredicateError> {
    let value = serde_json::to_value(args).map_err(|e| PredicateError::invalid(name, e.to_string()))?;
    serde_json::from_value(value).map_err(|e| PredicateError::invalid(name, e.to_string()))
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Config of the `EntIdCheck` predicate.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct EntIdCheckConfig {
    /// Comma-separated allow-list.
    #[serde(alias = "_genkey_0")]
    pub ent_id: String,
}

fn build_ent_id_check(config: EntIdCheckConfig) -> Result<EntIdMatcher, PredicateError> {
    if config.ent_id.trim().is_empty() {
        return Err(PredicateError::invalid(ENT_ID_CHECK, "`entId` must not be blank"));
    }
    Ok(EntIdMatcher::new(&config.ent_id))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathConfig {
    #[serde(alias = "_genkey_0")]
    pub patterns: String,
}

fn build_path(config: PathConfig) -> Result<PathMatcher, PredicateError> {
    let patterns = split_list(&config.patterns);
    if patterns.is_empty() {
        return Err(PredicateError::invalid(PATH, "`patterns` must not be empty"));
    }
    if let Some(bad) = patterns.iter().find(|p| !p.starts_with('/')) {
        return Err(PredicateError::invalid(PATH, format!("pattern `{}` must start with `/`", bad)));
    }
    Ok(PathMatcher::new(patterns))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    #[serde(alias = "_genkey_0")]
    pub patterns: String,
}

fn build_host(config: HostConfig) -> Result<HostMatcher, PredicateError> {
    let patterns = split_list(&config.patterns);
    if patterns.is_empty() {
        return Err(PredicateError::invalid(HOST, "`patterns` must not be empty"));
    }
    Ok(HostMatcher::new(patterns))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderConfig {
    #[serde(alias = "_genkey_0")]
    pub header: String,
    #[serde(default, alias = "_genkey_1")]
    pub value: Option<String>,
}

fn build_header(config: HeaderConfig) -> Result<HeaderMatcher, PredicateError> {
    let name = HeaderName::from_bytes(config.header.trim().as_bytes())
        .map_err(|e| PredicateError::invalid(HEADER, format!("`{}`: {}", config.header, e)))?;
    Ok(HeaderMatcher::new(name, config.value))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    #[serde(alias = "_genkey_0")]
    pub param: String,
    #[serde(default, alias = "_genkey_1")]
    pub value: Option<String>,
}

fn build_query(config: QueryConfig) -> Result<QueryMatcher, PredicateError> {
    if config.param.trim().is_empty() {
        return Err(PredicateError::invalid(QUERY, "`param` must not be blank"));
    }
    Ok(QueryMatcher::new(config.param, config.value))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodConfig {
    #[serde(alias = "_genkey_0")]
    pub methods: String,
}

fn build_method(config: MethodConfig) -> Result<MethodMatcher, PredicateError> {
    let methods = split_list(&config.methods)
        .into_iter()
        .map(|m| {
            Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .map_err(|_| PredicateError::invalid(METHOD, format!("unknown method `{}`", m)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if methods.is_empty() {
        return Err(PredicateError::invalid(METHOD, "`methods` must not be empty"));
    }
    Ok(MethodMatcher::new(methods))
}
