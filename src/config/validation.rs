//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce the reverse-mode upstream requirement
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before any socket is bound

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, ProxyMode};

/// A single semantic problem with the configuration.
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

/// Check every semantic invariant of `config`.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match (config.mode, config.upstream.url.as_deref().map(str::trim)) {
        (ProxyMode::Reverse, None) | (ProxyMode::Reverse, Some("")) => {
            errors.push(ValidationError::new(
                "upstream.url",
                "reverse mode requires an upstream URL",
            ));
        }
        (ProxyMode::Reverse, Some(raw)) => {
            if let Err(message) = check_upstream_url(raw) {
                errors.push(ValidationError::new("upstream.url", message));
            }
        }
        (ProxyMode::Forward, _) => {}
    }

    if !config.upstream.mount_path.starts_with('/') {
        errors.push(ValidationError::new(
            "upstream.mount_path",
            "must start with '/'",
        ));
    }

    if config.upstream.target_param.trim().is_empty() {
        errors.push(ValidationError::new(
            "upstream.target_param",
            "must not be empty",
        ));
    }

    if let Some(key) = &config.security.api_key {
        if key.is_empty() {
            errors.push(ValidationError::new(
                "security.api_key",
                "must not be empty when set",
            ));
        }
    }

    if config.security.allowed_origin.is_empty()
        || HeaderValue::from_str(&config.security.allowed_origin).is_err()
    {
        errors.push(ValidationError::new(
            "security.allowed_origin",
            "must be a non-empty header value",
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.window_ms", "must be > 0"));
    }

    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }

    if config.timeouts.forward_ms == 0 {
        errors.push(ValidationError::new("timeouts.forward_ms", "must be > 0"));
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("'{}' is not a socket address", addr),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}' is not a valid URL: {}", raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err(format!("'{}' has no host", raw));
    }
    Ok(())
}
