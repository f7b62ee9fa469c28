//! Configuration loading from disk and the environment.
//!
//! A TOML file (optional) provides the base configuration; command-line
//! flags and their environment-variable equivalents override individual
//! fields on top of it. Semantic checks live in `validation.rs`.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::builder::BoolishValueParser;
use clap::Parser;
use thiserror::Error;

use crate::config::schema::{ProxyConfig, ProxyMode};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Comma-separated list of IP literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpList(pub Vec<IpAddr>);

/// Command-line / environment surface of the proxy.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "edge-proxy", version, about = "HTTP reverse/forward proxy gateway", long_about = None)]
pub struct CliArgs {
    /// Optional TOML configuration file used as the base layer.
    #[arg(short, long, env = "PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "BIND_ADDRESS")]
    pub bind_address: Option<String>,

    #[arg(long, env = "PROXY_MODE", value_enum)]
    pub mode: Option<ProxyMode>,

    /// Fixed upstream for reverse mode (e.g., "http://localhost:8983/solr").
    #[arg(long, env = "UPSTREAM_URL")]
    pub upstream_url: Option<String>,

    #[arg(long, env = "MOUNT_PATH")]
    pub mount_path: Option<String>,

    /// Query parameter naming the destination in forward mode.
    #[arg(long, env = "FORWARD_TARGET_PARAM")]
    pub target_param: Option<String>,

    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "ALLOWED_ORIGIN")]
    pub allowed_origin: Option<String>,

    /// Body size cap, in bytes or with a unit suffix ("512kb", "10mb").
    #[arg(long, env = "REQUEST_SIZE_LIMIT", value_parser = parse_byte_size)]
    pub request_size_limit: Option<u64>,

    #[arg(long, env = "TRUST_PROXY", value_parser = BoolishValueParser::new())]
    pub trust_proxy: Option<bool>,

    #[arg(long, env = "IP_ALLOWLIST", value_parser = parse_ip_list)]
    pub ip_allowlist: Option<IpList>,

    #[arg(long, env = "RATE_LIMIT_WINDOW_MS")]
    pub rate_limit_window_ms: Option<u64>,

    #[arg(long, env = "RATE_LIMIT_MAX")]
    pub rate_limit_max: Option<u32>,

    #[arg(long, env = "FORWARD_PROXY_TIMEOUT_MS")]
    pub forward_timeout_ms: Option<u64>,

    #[arg(long, env = "DRAIN_TIMEOUT_MS")]
    pub drain_timeout_ms: Option<u64>,

    #[arg(long, env = "COMPRESSION", value_parser = BoolishValueParser::new())]
    pub compression: Option<bool>,

    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for daily-rotated JSON log files.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, env = "METRICS_ADDRESS")]
    pub metrics_address: Option<String>,
}

impl CliArgs {
    /// Build the effective configuration: file (if any), then overrides.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };
        Ok(self.apply(base))
    }

    /// Overlay every flag that was provided onto `config`.
    pub fn apply(self, mut config: ProxyConfig) -> ProxyConfig {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(addr) = self.bind_address {
            config.listener.bind_address = addr;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(url) = self.upstream_url {
            config.upstream.url = Some(url);
        }
        if let Some(mount) = self.mount_path {
            config.upstream.mount_path = mount;
        }
        if let Some(param) = self.target_param {
            config.upstream.target_param = param;
        }
        if let Some(key) = self.api_key {
            config.security.api_key = Some(key);
        }
        if let Some(origin) = self.allowed_origin {
            config.security.allowed_origin = origin;
        }
        if let Some(limit) = self.request_size_limit {
            config.security.max_body_size = limit;
        }
        if let Some(trust) = self.trust_proxy {
            config.security.trust_proxy_headers = trust;
        }
        if let Some(IpList(ips)) = self.ip_allowlist {
            config.security.ip_allowlist = if ips.is_empty() { None } else { Some(ips) };
        }
        if let Some(window) = self.rate_limit_window_ms {
            config.rate_limit.window_ms = window;
        }
        if let Some(max) = self.rate_limit_max {
            config.rate_limit.max_requests = max;
        }
        if let Some(timeout) = self.forward_timeout_ms {
            config.timeouts.forward_ms = timeout;
        }
        if let Some(drain) = self.drain_timeout_ms {
            config.timeouts.drain_ms = drain;
        }
        if let Some(compression) = self.compression {
            config.compression = compression;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(dir) = self.log_dir {
            config.observability.log_dir = Some(dir);
        }
        if let Some(addr) = self.metrics_address {
            config.observability.metrics_address = Some(addr);
        }
        config
    }
}

/// Parse "1048576", "512kb", "10mb", "1.5gb" (1024-based units).
pub fn parse_byte_size(raw: &str) -> Result<u64, String> {
    let value = raw.trim().to_ascii_lowercase();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid size '{}'", raw))?;
    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        other => return Err(format!("unknown size unit '{}'", other)),
    };

    Ok((number * multiplier as f64) as u64)
}

/// Parse a comma-separated list of IP literals, ignoring blanks.
pub fn parse_ip_list(raw: &str) -> Result<IpList, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>()
                .map_err(|_| format!("'{}' is not an IP address", s))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(IpList)
}
