//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject empty or duplicate root namespace entries
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = BTreeSet::new();
    for ns in &config.resolver.root_namespaces {
        if ns.trim().is_empty() {
            errors.push(ValidationError::new("resolver.root_namespaces", "empty namespace"));
        } else if !seen.insert(ns.as_str()) {
            errors.push(ValidationError::new(
                "resolver.root_namespaces",
                format!("duplicate namespace {:?}", ns),
            ));
        }
    }

    if config.watch.enabled && config.watch.debounce_ms == 0 {
        errors.push(ValidationError::new("watch.debounce_ms", "must be greater than 0"));
    }
    if config.watch.enabled && config.watch.max_wait_ms < config.watch.debounce_ms {
        errors.push(ValidationError::new(
            "watch.max_wait_ms",
            format!("must be at least watch.debounce_ms ({})", config.watch.debounce_ms),
        ));
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("invalid socket address {:?}", config.admin.bind_address),
            ));
        }
        if config.admin.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "admin.request_timeout_secs",
                "must be greater than 0",
            ));
        }
        if config.admin.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            errors.push(ValidationError::new("admin.api_key", "must not be empty when set"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
