//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration before anything else happens
//! - Initialize subsystems in dependency order (server, metrics)
//! - Bind the listener last and hand over to the server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and no socket is bound
//! - All validation errors are reported together

use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;

use crate::config::{validate_config, ProxyConfig, ValidationError};
use crate::http::server::{HttpServer, ServerError};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{self, ListenerError};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", summarize(.0))]
    Config(Vec<ValidationError>),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate, build, bind, and serve until `shutdown` fires.
pub async fn run(config: ProxyConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(field = error.field, message = %error.message, "Invalid configuration");
        }
        return Err(StartupError::Config(errors));
    }

    let metrics_address = config
        .observability
        .metrics_address
        .as_deref()
        .and_then(|raw| raw.parse::<SocketAddr>().ok());
    let listener_config = config.listener.clone();

    let server = HttpServer::new(config)?;
    if let Some(addr) = metrics_address {
        metrics::init_metrics(addr)?;
    }

    let listener = net::bind(&listener_config).await?;
    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyMode;

    #[tokio::test]
    async fn reverse_without_upstream_fails_before_bind() {
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = reserved.local_addr().unwrap().port();
        drop(reserved);

        let mut config = ProxyConfig::default();
        config.mode = ProxyMode::Reverse;
        config.upstream.url = None;
        config.listener.bind_address = "127.0.0.1".into();
        config.listener.port = port;

        let err = run(config, &Shutdown::new()).await.unwrap_err();
        match &err {
            StartupError::Config(errors) => {
                assert!(errors.iter().any(|e| e.field == "upstream.url"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
        assert!(err.to_string().contains("upstream.url"));
        assert!(std::net::TcpStream::connect(("127.0.0.1", port)).is_err());
    }

    #[tokio::test]
    async fn shutdown_requested_before_start_still_stops() {
        let mut config = ProxyConfig::default();
        config.mode = ProxyMode::Forward;
        config.listener.bind_address = "127.0.0.1".into();
        config.listener.port = 0;

        let shutdown = Shutdown::new();
        shutdown.trigger();

        tokio::time::timeout(std::time::Duration::from_secs(2), run(config, &shutdown))
            .await
            .expect("server did not stop")
            .unwrap();
    }
}
