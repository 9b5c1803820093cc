//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, timeouts, and log levels
//! - Check the route source has what its kind needs
//! - Detect bootstrap routes with empty or duplicate ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Predicate configs are checked when routes are compiled, not here

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, StoreKind};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than 0"));
    }

    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level `{}`", observability.log_level),
        ));
    }
    if observability.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &observability.metrics_address);
    }

    let source = &config.route_source;
    if source.kind != StoreKind::None {
        if source.data_id.trim().is_empty() {
            errors.push(ValidationError::new("route_source.data_id", "must not be empty"));
        }
        if source.group.trim().is_empty() {
            errors.push(ValidationError::new("route_source.group", "must not be empty"));
        }
        if source.fetch_timeout_ms == 0 {
            errors.push(ValidationError::new("route_source.fetch_timeout_ms", "must be greater than 0"));
        }
    }
    match source.kind {
        StoreKind::Nacos => {
            if source.server_addr.trim().is_empty() {
                errors.push(ValidationError::new("route_source.server_addr", "required for nacos"));
            }
            if source.poll_interval_ms < 100 {
                errors.push(ValidationError::new("route_source.poll_interval_ms", "must be at least 100"));
            }
        }
        StoreKind::File => {
            if source.directory.trim().is_empty() {
                errors.push(ValidationError::new("route_source.directory", "required for file"));
            }
        }
        StoreKind::None => {}
    }

    let mut seen = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        if route.id.is_empty() {
            errors.push(ValidationError::new(format!("routes[{}].id", i), "must not be empty"));
        } else if !seen.insert(route.id.as_str()) {
            errors.push(ValidationError::new(
                format!("routes[{}].id", i),
                format!("duplicate route id `{}`", route.id),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address `{}`", value)));
    }
}
