//! Forwarding target resolution.
//!
//! # Responsibilities
//! - Reverse mode: upstream base URL + (mount-stripped) path and query
//! - Forward mode: absolute URL taken from a query parameter
//! - Report unresolvable targets before any network call
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - One `resolve` entry point for both modes
//! - Forward mode applies no destination allowlist

use axum::http::{StatusCode, Uri};
use thiserror::Error;
use url::Url;

use crate::config::{ProxyConfig, ProxyMode};

/// Failure to compute a forwarding target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("Missing '{0}' query parameter")]
    MissingTarget(String),

    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("Not found")]
    OutsideMount,
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::MissingTarget(_) | RouteError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            RouteError::OutsideMount => StatusCode::NOT_FOUND,
        }
    }
}

/// Where admitted requests go.
#[derive(Debug, Clone)]
pub enum Target {
    /// Fixed upstream; the request path (minus `mount`) is appended.
    Static { base: String, mount: String },
    /// Destination read from query parameter `param`.
    Dynamic { param: String },
}

impl Target {
    /// Build the target for the configured mode. Reverse mode relies on
    /// `validate_config` having checked the upstream URL.
    pub fn from_config(config: &ProxyConfig) -> Self {
        match config.mode {
            ProxyMode::Reverse => Target::Static {
                base: config
                    .upstream
                    .url
                    .as_deref()
                    .unwrap_or_default()
                    .trim()
                    .trim_end_matches('/')
                    .to_string(),
                mount: config.upstream.mount_path.trim_end_matches('/').to_string(),
            },
            ProxyMode::Forward => Target::Dynamic {
                param: config.upstream.target_param.clone(),
            },
        }
    }

    /// Human-readable description for startup logs.
    pub fn describe(&self) -> String {
        match self {
            Target::Static { base, .. } => base.clone(),
            Target::Dynamic { param } => format!("?{}=<url>", param),
        }
    }

    /// Compute the absolute upstream URI for a request URI.
    pub fn resolve(&self, uri: &Uri) -> Result<Uri, RouteError> {
        match self {
            Target::Static { base, mount } => resolve_static(base, mount, uri),
            Target::Dynamic { param } => resolve_dynamic(param, uri),
        }
    }
}

fn resolve_static(base: &str, mount: &str, uri: &Uri) -> Result<Uri, RouteError> {
    let path = uri.path();
    let rest = if mount.is_empty() {
        path
    } else {
        match path.strip_prefix(mount) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => return Err(RouteError::OutsideMount),
        }
    };

    let mut target = String::with_capacity(base.len() + rest.len() + 1);
    target.push_str(base);
    if rest.is_empty() {
        target.push('/');
    } else {
        target.push_str(rest);
    }
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }

    target
        .parse::<Uri>()
        .map_err(|e| RouteError::InvalidTarget(e.to_string()))
}

fn resolve_dynamic(param: &str, uri: &Uri) -> Result<Uri, RouteError> {
    let raw = uri
        .query()
        .and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == param)
                .map(|(_, value)| value.into_owned())
        })
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| RouteError::MissingTarget(param.to_string()))?;

    let url = Url::parse(raw.trim()).map_err(|e| RouteError::InvalidTarget(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RouteError::InvalidTarget(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(RouteError::InvalidTarget("missing host".to_string()));
    }

    url.as_str()
        .parse::<Uri>()
        .map_err(|e| RouteError::InvalidTarget(e.to_string()))
}
