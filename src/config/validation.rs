//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (lock timeout > 0, addresses parse)
//! - Check each configured route has exactly the fields its kind uses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Catalog names are resolved later, at root build

use std::net::SocketAddr;

use crate::config::schema::{RouteKind, ServiceConfig};

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
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

/// Check `config`, collecting every problem.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if !config.router.base_path.starts_with('/') {
        errors.push(ValidationError::new("router.base_path", "must start with `/`"));
    }
    if config.router.lock_timeout_ms == 0 {
        errors.push(ValidationError::new("router.lock_timeout_ms", "must be greater than zero"));
    }

    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);
        if route.pattern.trim().is_empty() {
            errors.push(ValidationError::new(&field, "pattern is empty"));
        }

        let wants_target = matches!(
            route.kind,
            RouteKind::Route | RouteKind::Factory | RouteKind::Module | RouteKind::Redirect
        );
        match (&route.target, wants_target) {
            (None, true) => errors.push(ValidationError::new(
                &field,
                format!("{:?} route `{}` needs a target", route.kind, route.pattern),
            )),
            (Some(_), false) => errors.push(ValidationError::new(
                &field,
                format!("{:?} route `{}` takes no target", route.kind, route.pattern),
            )),
            _ => {}
        }

        if route.permanent && route.kind != RouteKind::Redirect {
            errors.push(ValidationError::new(&field, "`permanent` only applies to redirects"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("`{}` is not a socket address", config.admin.bind_address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
