//! Nacos config store client.
//!
//! # Responsibilities
//! - Point reads through the Nacos open API (`/nacos/v1/cs/configs`)
//! - Change notifications by polling and comparing payloads
//!
//! # Design Decisions
//! - Polling instead of the long-poll listener protocol: one plain GET per
//!   interval, push only when the content differs from the last payload seen
//! - Nothing counts as seen when a subscription starts, so the first
//!   successful poll is always pushed, even if the subscriber already holds it
//! - A deleted config (404) is not pushed; routes stay at last-known-good
//! - Errors back off exponentially; a success resets to the poll interval

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use url::Url;

use crate::resilience::poll_backoff;
use crate::store::{ConfigKey, ConfigStore, ConfigUpdates, StoreError};

const CONFIGS_PATH: &str = "nacos/v1/cs/configs";
const POLL_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_POLL_BACKOFF: Duration = Duration::from_secs(60);

/// Client for a Nacos config server.
#[derive(Debug, Clone)]
pub struct NacosConfigStore {
    client: reqwest::Client,
    endpoint: Url,
    namespace: Option<String>,
    poll_interval: Duration,
}

impl NacosConfigStore {
    /// `server_addr` is `host:port` or a full base URL (with context path).
    pub fn new(
        server_addr: &str,
        namespace: Option<String>,
        poll_interval: Duration,
    ) -> Result<Self, StoreError> {
        let endpoint = configs_endpoint(server_addr)?;
        let client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            endpoint,
            namespace: namespace.filter(|ns| !ns.trim().is_empty()),
            poll_interval,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn fetch(&self, key: &ConfigKey, timeout: Duration) -> Result<String, StoreError> {
        let mut query = vec![("dataId", key.data_id.as_str()), ("group", key.group.as_str())];
        if let Some(namespace) = &self.namespace {
            query.push(("tenant", namespace.as_str()));
        }

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Timeout(timeout)
                } else {
                    StoreError::Http(e)
                }
            })?;

        match response.status() {
            status if status.is_success() => Ok(response.text().await?),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.clone())),
            status => Err(StoreError::Status(status.as_u16())),
        }
    }
}

fn configs_endpoint(server_addr: &str) -> Result<Url, StoreError> {
    let addr = server_addr.trim();
    if addr.is_empty() {
        return Err(StoreError::InvalidAddress(server_addr.to_string()));
    }
    let mut base = if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    };
    if !base.ends_with('/') {
        base.push('/');
    }

    Url::parse(&base)
        .and_then(|url| url.join(CONFIGS_PATH))
        .map_err(|_| StoreError::InvalidAddress(server_addr.to_string()))
}

#[async_trait]
impl ConfigStore for NacosConfigStore {
    async fn get_config(&self, key: &ConfigKey, timeout: Duration) -> Result<String, StoreError> {
        self.fetch(key, timeout).await
    }

    async fn subscribe(&self, key: &ConfigKey) -> Result<ConfigUpdates, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut last_seen: Option<String> = None;

        let store = self.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let mut failures = 0u32;
            loop {
                let delay = poll_backoff(failures, store.poll_interval, MAX_POLL_BACKOFF);
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                match store.fetch(&key, POLL_TIMEOUT).await {
                    Ok(content) => {
                        failures = 0;
                        if last_seen.as_deref() == Some(content.as_str()) {
                            continue;
                        }
                        tracing::info!(key = %key, bytes = content.len(), "Nacos config changed");
                        last_seen = Some(content.clone());
                        if tx.send(content).is_err() {
                            break;
                        }
                    }
                    Err(StoreError::NotFound(_)) => {
                        failures = 0;
                        tracing::debug!(key = %key, "Nacos config absent, keeping last payload");
                    }
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        tracing::warn!(key = %key, failures, error = %e, "Nacos config poll failed");
                    }
                }
            }
            tracing::debug!(key = %key, "Nacos poller stopped");
        });

        tracing::info!(endpoint = %self.endpoint, interval = ?self.poll_interval, "Nacos config poller started");
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::StatusCode as HttpStatus;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use crate::config::ConfigWatcher;
    use crate::lifecycle::Shutdown;
    use crate::routing::{RouteService, RouteTable};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Configs = Arc<Mutex<HashMap<(String, String), String>>>;

    async fn serve_configs(
        State(configs): State<Configs>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<String, HttpStatus> {
        let data_id = params.get("dataId").cloned().unwrap_or_default();
        let group = params.get("group").cloned().unwrap_or_default();
        configs
            .lock()
            .unwrap()
            .get(&(data_id, group))
            .cloned()
            .ok_or(HttpStatus::NOT_FOUND)
    }

    async fn next_push(updates: &mut ConfigUpdates) -> String {
        tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .expect("no config pushed")
            .expect("subscription closed")
    }

    async fn start_mock_nacos(configs: Configs) -> String {
        let app = Router::new()
            .route("/nacos/v1/cs/configs", get(serve_configs))
            .with_state(configs);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }

    #[test]
    fn test_endpoint_building() {
        let url = configs_endpoint("127.0.0.1:8848").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8848/nacos/v1/cs/configs");

        let url = configs_endpoint("https://cfg.internal/ctx").unwrap();
        assert_eq!(url.as_str(), "https://cfg.internal/ctx/nacos/v1/cs/configs");

        assert!(matches!(configs_endpoint("  "), Err(StoreError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_get_config_and_not_found() {
        let configs: Configs = Arc::default();
        configs.lock().unwrap().insert(
            ("gateway-routes".into(), "DEFAULT_GROUP".into()),
            "[]".into(),
        );
        let addr = start_mock_nacos(configs).await;
        let store = NacosConfigStore::new(&addr, None, Duration::from_millis(50)).unwrap();

        let key = ConfigKey::new("gateway-routes", "DEFAULT_GROUP");
        assert_eq!(store.get_config(&key, Duration::from_secs(5)).await.unwrap(), "[]");

        let missing = ConfigKey::new("other", "DEFAULT_GROUP");
        let err = store.get_config(&missing, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_subscribe_pushes_only_changes() {
        let configs: Configs = Arc::default();
        let slot = ("gateway-routes".to_string(), "DEFAULT_GROUP".to_string());
        configs.lock().unwrap().insert(slot.clone(), "[]".into());

        let addr = start_mock_nacos(configs.clone()).await;
        let store = NacosConfigStore::new(&addr, None, Duration::from_millis(20)).unwrap();
        let key = ConfigKey::new("gateway-routes", "DEFAULT_GROUP");

        let mut updates = store.subscribe(&key).await.unwrap();

        // Current payload once, then nothing while it stays unchanged
        assert_eq!(next_push(&mut updates).await, "[]");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(updates.try_recv().is_err());

        let next = r#"[{"id":"r1","uri":"lb://a"}]"#;
        configs.lock().unwrap().insert(slot, next.into());
        assert_eq!(next_push(&mut updates).await, next);
    }

    #[tokio::test]
    async fn test_subscribe_pushes_payload_changed_after_fetch() {
        let configs: Configs = Arc::default();
        let slot = ("gateway-routes".to_string(), "DEFAULT_GROUP".to_string());
        configs.lock().unwrap().insert(slot.clone(), "[]".into());

        let addr = start_mock_nacos(configs.clone()).await;
        let store = NacosConfigStore::new(&addr, None, Duration::from_millis(20)).unwrap();
        let key = ConfigKey::new("gateway-routes", "DEFAULT_GROUP");

        assert_eq!(store.get_config(&key, Duration::from_secs(5)).await.unwrap(), "[]");
        let changed = r#"[{"id":"r1","uri":"lb://a"}]"#;
        configs.lock().unwrap().insert(slot, changed.into());

        let mut updates = store.subscribe(&key).await.unwrap();
        assert_eq!(next_push(&mut updates).await, changed);
    }

    #[tokio::test]
    async fn test_watcher_loads_routes_after_failed_initial_fetch() {
        let configs: Configs = Arc::default();
        configs.lock().unwrap().insert(
            ("gateway-routes".into(), "DEFAULT_GROUP".into()),
            r#"[{"id":"r1","uri":"lb://a"}]"#.into(),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/nacos/v1/cs/configs",
                get({
                    let hits = hits.clone();
                    move |state: State<Configs>, query: Query<HashMap<String, String>>| {
                        let first = hits.fetch_add(1, Ordering::SeqCst) == 0;
                        async move {
                            if first {
                                Err(HttpStatus::SERVICE_UNAVAILABLE)
                            } else {
                                serve_configs(state, query).await
                            }
                        }
                    }
                }),
            )
            .with_state(configs);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let store = NacosConfigStore::new(&addr, None, Duration::from_millis(20)).unwrap();
        let service = Arc::new(RouteService::new(Arc::new(RouteTable::default())));
        let shutdown = Shutdown::new();
        let mut refresh = service.subscribe();

        let watcher = ConfigWatcher::new(Arc::new(store), service.clone());
        let key = ConfigKey::new("gateway-routes", "DEFAULT_GROUP");
        let handle = watcher.start(key, shutdown.subscribe()).await.unwrap();
        assert!(service.snapshot().is_empty());

        tokio::time::timeout(Duration::from_secs(5), refresh.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(service.snapshot().ids(), vec!["r1"]);

        shutdown.trigger();
        handle.join().await;
    }
}
