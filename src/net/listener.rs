//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind the configured address (IPv4, IPv6, or hostname)
//! - Report the bound address for the startup log
//!
//! # Design Decisions
//! - Binding happens only after configuration validation succeeded
//! - Accepting is left to `axum::serve`

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind the configured listen address.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let address = config.socket_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.clone(),
            source,
        })?;

    if let Ok(local) = listener.local_addr() {
        tracing::debug!(address = %local, "Listener bound");
    }
    Ok(listener)
}
