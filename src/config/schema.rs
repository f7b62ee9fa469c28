//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default request body cap (10 MiB).
pub const DEFAULT_MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy mode (reverse or forward).
    pub mode: ProxyMode,

    /// Listener configuration (bind address, port).
    pub listener: ListenerConfig,

    /// Upstream target resolution.
    pub upstream: UpstreamConfig,

    /// Admission policies.
    pub security: SecurityConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Gzip responses when the client accepts it.
    pub compression: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mode: ProxyMode::default(),
            listener: ListenerConfig::default(),
            upstream: UpstreamConfig::default(),
            security: SecurityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            compression: true,
        }
    }
}

/// How the forwarding target is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// Every request goes to `upstream.url`.
    #[default]
    Reverse,
    /// Every request names its own destination.
    Forward,
}

impl ProxyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyMode::Reverse => "reverse",
            ProxyMode::Forward => "forward",
        }
    }
}

impl std::fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// TCP port to listen on.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 7812,
        }
    }
}

impl ListenerConfig {
    /// `host:port` string suitable for binding.
    pub fn socket_address(&self) -> String {
        if self.bind_address.contains(':') {
            format!("[{}]:{}", self.bind_address, self.port)
        } else {
            format!("{}:{}", self.bind_address, self.port)
        }
    }
}

/// Upstream target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Fixed upstream base URL (reverse mode only).
    pub url: Option<String>,

    /// Path prefix served by the proxy in reverse mode. Stripped before
    /// the remainder is appended to `url`.
    pub mount_path: String,

    /// Query parameter carrying the destination in forward mode.
    pub target_param: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            mount_path: "/".to_string(),
            target_param: "url".to_string(),
        }
    }
}

/// Admission policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Shared secret expected in `x-api-key`. Gate disabled when unset.
    pub api_key: Option<String>,

    /// Value mirrored in `Access-Control-Allow-Origin`.
    pub allowed_origin: String,

    /// Client IPs allowed through. Gate disabled when unset.
    pub ip_allowlist: Option<Vec<IpAddr>>,

    /// Derive the client IP from `x-forwarded-for`.
    pub trust_proxy_headers: bool,

    /// Maximum body size in bytes.
    pub max_body_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            allowed_origin: "*".to_string(),
            ip_allowlist: None,
            trust_proxy_headers: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Requests allowed per client IP per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 300,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound on connect + response headers for one forward attempt.
    pub forward_ms: u64,

    /// Upper bound on the draining phase during shutdown.
    pub drain_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            forward_ms: 20_000,
            drain_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn forward(&self) -> Duration {
        Duration::from_millis(self.forward_ms)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_millis(self.drain_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory for daily-rotated JSON logs. Stdout only when unset.
    pub log_dir: Option<PathBuf>,

    /// Prometheus scrape address. Metrics disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
            metrics_address: None,
        }
    }
}
