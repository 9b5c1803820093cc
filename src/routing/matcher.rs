//! Request matchers.
//!
//! # Responsibilities
//! - Evaluate one compiled condition against an inbound request
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive
//! - Path, header, query and `entId` matching are case-sensitive
//! - Query values are compared after URL decoding
//! - No regex to guarantee O(n) matching

use std::borrow::Cow;

use axum::body::Body;
use axum::http::{header, HeaderName, Method, Request};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// First value of a query parameter, URL-decoded.
pub fn query_param<'a>(req: &'a Request<Body>, name: &str) -> Option<Cow<'a, str>> {
    let query = req.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// Allow-list check on the `entId` query parameter.
#[derive(Debug, Clone)]
pub struct EntIdMatcher {
    allowed: Vec<String>,
}

impl EntIdMatcher {
    /// Build from a comma-separated allow-list. Entries are kept verbatim.
    pub fn new(allow_list: &str) -> Self {
        Self {
            allowed: allow_list.split(',').map(str::to_string).collect(),
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

impl Matcher for EntIdMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        match query_param(req, "entId") {
            Some(ent_id) if !ent_id.trim().is_empty() => {
                self.allowed.iter().any(|allowed| *allowed == *ent_id)
            }
            _ => false,
        }
    }
}

/// Matches the Host header against a set of patterns.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    patterns: Vec<String>,
}

impl HostMatcher {
    /// Patterns are normalized to lowercase. A leading `*.` matches any subdomain.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    fn host_matches(pattern: &str, host: &str) -> bool {
        match pattern.strip_prefix('*') {
            Some(suffix) if suffix.starts_with('.') => host.ends_with(suffix),
            _ => pattern == host,
        }
    }
}

/// Host without its port. Bracketed IPv6 literals keep their brackets.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    match host.split_once(':') {
        Some((name, port)) if !port.contains(':') => name,
        _ => host,
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().host());

        let Some(host) = host else {
            return false;
        };
        // Port is not part of the match
        let host = strip_port(host).to_lowercase();
        self.patterns.iter().any(|p| Self::host_matches(p, &host))
    }
}

/// Matches the request path against exact or `/**` prefix patterns.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    patterns: Vec<PathPattern>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPattern {
    Exact(String),
    /// Matches the prefix itself and anything below it.
    Prefix(String),
}

impl PathMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref().trim();
                match p.strip_suffix("/**") {
                    Some(prefix) => PathPattern::Prefix(prefix.to_string()),
                    None => PathPattern::Exact(p.to_string()),
                }
            })
            .collect();
        Self { patterns }
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        let path = req.uri().path();
        self.patterns.iter().any(|pattern| match pattern {
            PathPattern::Exact(exact) => path == exact,
            PathPattern::Prefix(prefix) => {
                prefix.is_empty()
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            }
        })
    }
}

/// Matches a header's presence, or its exact value.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: HeaderName,
    value: Option<String>,
}

impl HeaderMatcher {
    pub fn new(name: HeaderName, value: Option<String>) -> Self {
        Self { name, value }
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        let mut values = req.headers().get_all(&self.name).iter();
        match &self.value {
            None => values.next().is_some(),
            Some(expected) => values.any(|v| v.to_str().is_ok_and(|v| v == expected)),
        }
    }
}

/// Matches a query parameter's presence, or its exact value.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    param: String,
    value: Option<String>,
}

impl QueryMatcher {
    pub fn new(param: impl Into<String>, value: Option<String>) -> Self {
        Self {
            param: param.into(),
            value,
        }
    }
}

impl Matcher for QueryMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        match (query_param(req, &self.param), &self.value) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected.as_str(),
            (None, _) => false,
        }
    }
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(methods: Vec<Method>) -> Self {
        Self { methods }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.methods.contains(req.method())
    }
}

/// Combines multiple matchers with AND semantics.
///
/// An empty set matches every request.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}
