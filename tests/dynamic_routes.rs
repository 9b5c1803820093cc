//! End-to-end route reloads through a config store.

use std::sync::Arc;
use std::time::Duration;

use dynamic_gateway::config::ConfigWatcher;
use dynamic_gateway::lifecycle::Shutdown;
use dynamic_gateway::routing::RouteDefinition;
use dynamic_gateway::store::file::FileConfigStore;
use dynamic_gateway::store::memory::MemoryConfigStore;
use dynamic_gateway::store::ConfigKey;

mod common;

use common::{eventually, next_refresh, request_for, Gateway};

const R1: &str = r#"[{
    "id": "r1",
    "uri": "lb://orders",
    "predicates": [{"name": "EntIdCheck", "args": {"entId": "9"}}]
}]"#;

fn key() -> ConfigKey {
    ConfigKey::new("gateway-routes", "DEFAULT_GROUP")
}

#[tokio::test]
async fn test_initial_load_then_push_empty_list() {
    let gateway = Gateway::new();
    let shutdown = Shutdown::new();
    let store = MemoryConfigStore::new();
    store.set(&key(), R1);

    let locator_task = tokio::spawn(
        gateway
            .locator
            .clone()
            .run(gateway.service.subscribe(), shutdown.subscribe()),
    );
    let mut refresh = gateway.service.subscribe();

    let watcher = ConfigWatcher::new(Arc::new(store.clone()), gateway.service.clone());
    let handle = watcher.start(key(), shutdown.subscribe()).await.unwrap();

    // Initial fetch produced exactly r1
    assert_eq!(gateway.table.snapshot().ids(), vec!["r1"]);
    let loaded = next_refresh(&mut refresh).await;

    eventually(|| gateway.locator.version() == loaded.version).await;
    let matched = gateway.locator.match_request(&request_for(Some("9"))).unwrap();
    assert_eq!(matched.id(), "r1");
    assert!(gateway.locator.match_request(&request_for(Some("4"))).is_none());

    store.publish(&key(), "[]");
    let cleared = next_refresh(&mut refresh).await;

    assert!(gateway.table.snapshot().is_empty());
    assert_eq!(cleared.version, gateway.table.version());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(refresh.try_recv().is_err(), "expected exactly one refresh signal");

    eventually(|| gateway.locator.snapshot().is_empty()).await;
    assert!(gateway.locator.match_request(&request_for(Some("9"))).is_none());

    shutdown.trigger();
    handle.join().await;
    locator_task.await.unwrap();
}

#[tokio::test]
async fn test_malformed_push_keeps_last_known_good() {
    let gateway = Gateway::new();
    let shutdown = Shutdown::new();
    let store = MemoryConfigStore::new();
    store.set(&key(), R1);
    let mut refresh = gateway.service.subscribe();

    let watcher = ConfigWatcher::new(Arc::new(store.clone()), gateway.service.clone());
    let handle = watcher.start(key(), shutdown.subscribe()).await.unwrap();
    let loaded = next_refresh(&mut refresh).await;

    store.publish(&key(), r#"[{"uri": "lb://missing-id"}]"#);
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.publish(&key(), "not json at all");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(refresh.try_recv().is_err());
    assert_eq!(gateway.table.version(), loaded.version);
    assert_eq!(gateway.table.snapshot().ids(), vec!["r1"]);

    shutdown.trigger();
    handle.join().await;
}

#[tokio::test]
async fn test_invalid_route_rejected_siblings_applied() {
    let gateway = Gateway::new();
    let shutdown = Shutdown::new();
    let store = MemoryConfigStore::new();
    let mut refresh = gateway.service.subscribe();

    let watcher = ConfigWatcher::new(Arc::new(store.clone()), gateway.service.clone());
    let handle = watcher.start(key(), shutdown.subscribe()).await.unwrap();

    store.publish(
        &key(),
        r#"[
            {"id": "", "uri": "lb://nameless"},
            {"id": "bad-predicate", "uri": "lb://x", "predicates": [{"name": "NoSuchThing"}]},
            {"id": "good", "uri": "lb://good"}
        ]"#,
    );
    next_refresh(&mut refresh).await;

    assert_eq!(gateway.table.snapshot().ids(), vec!["good"]);

    shutdown.trigger();
    handle.join().await;
}

#[tokio::test]
async fn test_bootstrap_routes_replaced_by_first_load() {
    let gateway = Gateway::new();
    let shutdown = Shutdown::new();
    gateway
        .service
        .add(RouteDefinition::new("static", "lb://static"))
        .unwrap();

    let store = MemoryConfigStore::new();
    store.set(&key(), R1);
    let watcher = ConfigWatcher::new(Arc::new(store), gateway.service.clone());
    let handle = watcher.start(key(), shutdown.subscribe()).await.unwrap();

    assert_eq!(gateway.table.snapshot().ids(), vec!["r1"]);

    shutdown.trigger();
    handle.join().await;
}

#[tokio::test]
async fn test_file_store_reload() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path());
    let path = store.path_for(&key());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, R1).unwrap();

    let gateway = Gateway::new();
    let shutdown = Shutdown::new();
    let mut refresh = gateway.service.subscribe();

    let watcher = ConfigWatcher::new(Arc::new(store.clone()), gateway.service.clone());
    let handle = watcher.start(key(), shutdown.subscribe()).await.unwrap();
    next_refresh(&mut refresh).await;
    assert_eq!(gateway.table.snapshot().ids(), vec!["r1"]);

    let staged = dir.path().join("staged.json");
    std::fs::write(&staged, r#"[{"id":"r2","uri":"lb://r2"}]"#).unwrap();
    std::fs::rename(&staged, &path).unwrap();

    eventually(|| gateway.table.snapshot().ids() == vec!["r2"]).await;

    shutdown.trigger();
    handle.join().await;
    store.unwatch_all();
}

#[tokio::test]
async fn test_file_store_recovers_after_failed_initial_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileConfigStore::new(dir.path());
    let path = store.path_for(&key());

    let gateway = Gateway::new();
    let shutdown = Shutdown::new();

    // Nothing on disk yet: the initial fetch fails, the subscription stays
    let watcher = ConfigWatcher::new(Arc::new(store.clone()), gateway.service.clone());
    let handle = watcher.start_or_retry(key(), shutdown.subscribe()).await;
    assert!(gateway.table.snapshot().is_empty());

    let staged = dir.path().join("staged.json");
    std::fs::write(&staged, R1).unwrap();
    std::fs::rename(&staged, &path).unwrap();

    eventually(|| gateway.table.snapshot().ids() == vec!["r1"]).await;

    shutdown.trigger();
    handle.join().await;
    store.unwatch_all();
}
