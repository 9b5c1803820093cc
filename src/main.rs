//! Dynamic route gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Config store (nacos | file)
//!            │ initial fetch (bounded) + change pushes
//!            ▼
//!     ┌──────────────┐  decode   ┌──────────────┐  replace_all  ┌────────────┐
//!     │ConfigWatcher │──────────▶│ RouteService │──────────────▶│ RouteTable │
//!     └──────────────┘           └──────┬───────┘               └─────┬──────┘
//!                                       │ RefreshEvent                │ snapshot
//!                                       ▼                             │
//!     Client Request  ┌────────┐  ┌──────────────┐                    │
//!     ───────────────▶│  http  │─▶│ RouteLocator │◀───────────────────┘
//!                     └────────┘  └──────────────┘
//!
//!     Admin API ──────▶ RouteService (add / replace / delete all)
//! ```
//!
//! Startup order: logging, metrics, route table, bootstrap routes, route
//! watcher (initial load), admin API, gateway listener.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use dynamic_gateway::admin::serve_admin;
use dynamic_gateway::config::loader::{load_config, ConfigError};
use dynamic_gateway::config::validation::validate_config;
use dynamic_gateway::config::{ConfigWatcher, GatewayConfig};
use dynamic_gateway::http::{AppState, GatewayServer};
use dynamic_gateway::lifecycle::signals::spawn_signal_handler;
use dynamic_gateway::lifecycle::Shutdown;
use dynamic_gateway::observability::{logging, metrics};
use dynamic_gateway::routing::{PredicateRegistry, RouteLocator, RouteService, RouteTable};
use dynamic_gateway::store::build_store;

#[derive(Parser, Debug)]
#[command(name = "dynamic-gateway", version)]
#[command(about = "Gateway with routes reloaded from a remote config store", long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the route config data id
    #[arg(long)]
    data_id: Option<String>,

    /// Override the route config group
    #[arg(long)]
    group: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(data_id) = args.data_id {
        config.route_source.data_id = data_id;
    }
    if let Some(group) = args.group {
        config.route_source.group = group;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dynamic-gateway starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    // Table is empty and wired before anything can write to it
    let registry = Arc::new(PredicateRegistry::with_defaults());
    tracing::debug!(predicates = ?registry.names(), "Predicate registry ready");
    let table = Arc::new(RouteTable::new(registry));
    let service = Arc::new(RouteService::new(table.clone()));
    let locator = Arc::new(RouteLocator::new(table));
    let locator_task = tokio::spawn(locator.clone().run(service.subscribe(), shutdown.subscribe()));

    for definition in config.routes.clone() {
        let id = definition.id.clone();
        if let Err(e) = service.add(definition) {
            tracing::warn!(route_id = %id, error = %e, "Skipping bootstrap route");
        }
    }

    let mut state = AppState::new(locator, service.clone());
    let watch = match build_store(&config.route_source)? {
        Some(store) => {
            let key = config.route_source.key();
            state = state.with_source(key.clone());
            let watcher = ConfigWatcher::new(store, service.clone())
                .with_fetch_timeout(config.route_source.fetch_timeout());
            Some(watcher.start_or_retry(key, shutdown.subscribe()).await)
        }
        None => {
            tracing::info!("No route source configured, serving static routes only");
            None
        }
    };

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        Some(tokio::spawn(serve_admin(listener, state.clone(), shutdown.clone())))
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(state, Duration::from_secs(config.listener.request_timeout_secs));
    let served = server.run(listener, shutdown.clone()).await;

    // Listener errors also bring the background tasks down
    shutdown.trigger();

    if let Some(handle) = watch {
        handle.join().await;
    }
    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin API task panicked"),
            Ok(Ok(())) => {}
        }
    }
    if let Err(e) = locator_task.await {
        tracing::error!(error = %e, "Route locator task panicked");
    }

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
