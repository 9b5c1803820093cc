//! Snapshot-based route table.
//!
//! # Responsibilities
//! - Compile route definitions (validation happens here, never per request)
//! - Publish complete, immutable snapshots to readers
//! - Single-route insert, clear, and whole-table replacement
//!
//! # Design Decisions
//! - Readers do one `ArcSwap::load`; they never see a half-built table
//! - Writers are serialized by a mutex and build the next snapshot off to the side
//! - An overwrite keeps the route's existing position
//! - Every published snapshot gets a new version

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::Request;

use crate::routing::definition::RouteDefinition;
use crate::routing::error::RouteError;
use crate::routing::matcher::{AndMatcher, Matcher};
use crate::routing::predicate::PredicateRegistry;

/// A validated route with its predicates compiled.
#[derive(Debug)]
pub struct Route {
    definition: RouteDefinition,
    predicate: AndMatcher,
}

impl Route {
    /// Validate and compile a definition.
    pub fn compile(definition: RouteDefinition, registry: &PredicateRegistry) -> Result<Self, RouteError> {
        if definition.id.is_empty() {
            return Err(RouteError::EmptyId);
        }
        if definition.uri.trim().is_empty() {
            return Err(RouteError::EmptyUri(definition.id));
        }
        let predicate = registry
            .compile(&definition.predicates)
            .map_err(|source| RouteError::Predicate {
                id: definition.id.clone(),
                source,
            })?;
        Ok(Self {
            definition,
            predicate,
        })
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn uri(&self) -> &str {
        &self.definition.uri
    }

    pub fn definition(&self) -> &RouteDefinition {
        &self.definition
    }

    /// True if every predicate of the route matches.
    pub fn matches(&self, req: &Request<Body>) -> bool {
        self.predicate.matches(req)
    }
}

/// An immutable view of the whole table.
#[derive(Debug, Default)]
pub struct RouteSnapshot {
    /// Routes in table order.
    routes: Vec<Arc<Route>>,
    /// Indices into `routes`, stable-sorted by `order`.
    resolution: Vec<usize>,
    version: u64,
}

impl RouteSnapshot {
    fn build(routes: Vec<Arc<Route>>, version: u64) -> Self {
        let mut resolution: Vec<usize> = (0..routes.len()).collect();
        resolution.sort_by_key(|&i| routes[i].definition.order);
        Self {
            routes,
            resolution,
            version,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes in table order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.id()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Route>> {
        self.routes.iter().find(|r| r.id() == id)
    }

    /// First route, by `order` then table order, whose predicates all match.
    pub fn match_request(&self, req: &Request<Body>) -> Option<&Arc<Route>> {
        self.resolution
            .iter()
            .map(|&i| &self.routes[i])
            .find(|route| route.matches(req))
    }
}

/// A route that was skipped during a reload.
#[derive(Debug)]
pub struct RejectedRoute {
    /// Empty when the definition itself had no id.
    pub id: String,
    pub error: RouteError,
}

/// Outcome of [`RouteTable::replace_all`].
#[derive(Debug, Default)]
pub struct ReloadReport {
    pub version: u64,
    /// Number of routes in the new snapshot.
    pub applied: usize,
    pub rejected: Vec<RejectedRoute>,
}

impl ReloadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// The live route table.
#[derive(Debug)]
pub struct RouteTable {
    current: ArcSwap<RouteSnapshot>,
    write_lock: Mutex<()>,
    registry: Arc<PredicateRegistry>,
}

impl RouteTable {
    /// An empty table using the given predicate registry.
    pub fn new(registry: Arc<PredicateRegistry>) -> Self {
        Self {
            current: ArcSwap::from_pointee(RouteSnapshot::default()),
            write_lock: Mutex::new(()),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<PredicateRegistry> {
        &self.registry
    }

    /// The current snapshot (lock-free).
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    /// Insert a route, or overwrite the one with the same id.
    ///
    /// Returns the version of the published snapshot.
    pub fn add_route(&self, definition: RouteDefinition) -> Result<u64, RouteError> {
        let route = Arc::new(Route::compile(definition, &self.registry)?);

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load();
        let mut routes = current.routes.clone();
        match routes.iter().position(|r| r.id() == route.id()) {
            Some(i) => routes[i] = route,
            None => routes.push(route),
        }

        let version = current.version + 1;
        self.current.store(Arc::new(RouteSnapshot::build(routes, version)));
        Ok(version)
    }

    /// Remove every route. Returns the version of the empty snapshot, or
    /// `None`, publishing nothing, if the table was already empty.
    pub fn clear_all(&self) -> Option<u64> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load();
        if current.is_empty() {
            return None;
        }

        tracing::debug!(routes = ?current.ids(), "Clearing route table");
        let version = current.version + 1;
        self.current.store(Arc::new(RouteSnapshot::build(Vec::new(), version)));
        Some(version)
    }

    /// Replace the whole table in one swap.
    ///
    /// Invalid definitions are skipped and reported; the rest are applied.
    pub fn replace_all(&self, definitions: Vec<RouteDefinition>) -> ReloadReport {
        let mut rejected = Vec::new();
        let mut routes: Vec<Arc<Route>> = Vec::with_capacity(definitions.len());
        let mut positions: HashMap<String, usize> = HashMap::new();

        for definition in definitions {
            let id = definition.id.clone();
            match Route::compile(definition, &self.registry) {
                Ok(route) => match positions.get(&id) {
                    Some(&i) => routes[i] = Arc::new(route),
                    None => {
                        positions.insert(id, routes.len());
                        routes.push(Arc::new(route));
                    }
                },
                Err(error) => rejected.push(RejectedRoute { id, error }),
            }
        }

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let version = self.current.load().version + 1;
        let applied = routes.len();
        self.current.store(Arc::new(RouteSnapshot::build(routes, version)));

        ReloadReport {
            version,
            applied,
            rejected,
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(Arc::new(PredicateRegistry::with_defaults()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::definition::PredicateDefinition;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn route(id: &str) -> RouteDefinition {
        RouteDefinition::new(id, format!("lb://{}", id))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::default()).unwrap()
    }

    #[test]
    fn test_add_and_overwrite() {
        let table = RouteTable::default();
        table.add_route(route("a")).unwrap();
        table.add_route(route("b")).unwrap();
        table.add_route(RouteDefinition::new("a", "lb://a-v2")).unwrap();

        let snapshot = table.snapshot();
        assert_eq!(snapshot.ids(), vec!["a", "b"]);
        assert_eq!(snapshot.get("a").unwrap().uri(), "lb://a-v2");
        assert_eq!(snapshot.version(), 3);
    }

    #[test]
    fn test_add_rejects_empty_id() {
        let table = RouteTable::default();
        let err = table.add_route(route("")).unwrap_err();
        assert!(matches!(err, RouteError::EmptyId));
        assert!(table.snapshot().is_empty());
        assert_eq!(table.version(), 0);
    }

    #[test]
    fn test_add_rejects_bad_predicate() {
        let table = RouteTable::default();
        let def = route("r1").with_predicate(PredicateDefinition::new("EntIdCheck"));
        let err = table.add_route(def).unwrap_err();
        assert!(matches!(err, RouteError::Predicate { ref id, .. } if id == "r1"));
        assert!(table.snapshot().is_empty());
    }

    #[test]
    fn test_clear_all() {
        let table = RouteTable::default();
        assert_eq!(table.clear_all(), None);
        assert_eq!(table.version(), 0);

        table.add_route(route("a")).unwrap();
        assert_eq!(table.clear_all(), Some(2));
        assert!(table.snapshot().is_empty());
        assert_eq!(table.clear_all(), None);
        assert_eq!(table.version(), 2);
    }

    #[test]
    fn test_replace_all_partial_success() {
        let table = RouteTable::default();
        table.add_route(route("old")).unwrap();

        let report = table.replace_all(vec![
            route("a"),
            route(""),
            route("b").with_predicate(PredicateDefinition::new("NoSuchPredicate")),
            route("c"),
        ]);

        assert_eq!(report.applied, 2);
        assert_eq!(report.rejected.len(), 2);
        assert!(matches!(report.rejected[0].error, RouteError::EmptyId));
        assert_eq!(report.rejected[1].id, "b");
        assert_eq!(table.snapshot().ids(), vec!["a", "c"]);
    }

    #[test]
    fn test_replace_all_duplicate_ids() {
        let table = RouteTable::default();
        table.replace_all(vec![route("a"), route("b"), RouteDefinition::new("a", "lb://last")]);

        let snapshot = table.snapshot();
        assert_eq!(snapshot.ids(), vec!["a", "b"]);
        assert_eq!(snapshot.get("a").unwrap().uri(), "lb://last");
    }

    #[test]
    fn test_replace_all_idempotent() {
        let table = RouteTable::default();
        let defs = vec![route("a"), route("b").with_order(-1)];

        table.replace_all(defs.clone());
        let first: Vec<RouteDefinition> = table.snapshot().routes().map(|r| r.definition().clone()).collect();
        table.replace_all(defs);
        let second: Vec<RouteDefinition> = table.snapshot().routes().map(|r| r.definition().clone()).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_match_respects_order() {
        let table = RouteTable::default();
        table.replace_all(vec![
            route("catch-all").with_order(10),
            route("orders")
                .with_predicate(PredicateDefinition::new("Path").arg("patterns", "/orders/**")),
        ]);

        let snapshot = table.snapshot();
        assert_eq!(snapshot.match_request(&get("/orders/1")).unwrap().id(), "orders");
        assert_eq!(snapshot.match_request(&get("/users")).unwrap().id(), "catch-all");
    }

    #[test]
    fn test_concurrent_reader_sees_whole_snapshots() {
        let table = Arc::new(RouteTable::default());
        let batch_a: Vec<RouteDefinition> = (0..50).map(|i| route(&format!("a{}", i))).collect();
        let batch_b: Vec<RouteDefinition> = (0..80).map(|i| route(&format!("b{}", i))).collect();
        table.replace_all(batch_a.clone());

        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let table = table.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut observed = 0;
                loop {
                    let done = stop.load(Ordering::Relaxed);
                    let snapshot = table.snapshot();
                    let ids = snapshot.ids();
                    let all_a = ids.len() == 50 && ids.iter().all(|id| id.starts_with('a'));
                    let all_b = ids.len() == 80 && ids.iter().all(|id| id.starts_with('b'));
                    assert!(all_a || all_b, "observed partial table of {} routes", ids.len());
                    observed += 1;
                    if done {
                        break observed;
                    }
                }
            })
        };

        for i in 0..200 {
            let batch = if i % 2 == 0 { batch_b.clone() } else { batch_a.clone() };
            table.replace_all(batch);
        }
        stop.store(true, Ordering::Relaxed);

        assert!(reader.join().unwrap() > 0);
    }
}
