//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT (Ctrl+C) and, on Unix, SIGTERM
//! - Translate the first one into a `Shutdown` trigger
//! - Exit immediately on a repeated signal while draining
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that fails to install is logged, not fatal; the other
//!   signal still works

use crate::lifecycle::shutdown::Shutdown;

/// Spawn signal listeners that trigger `shutdown`.
pub fn install(shutdown: &Shutdown) {
    let on_sigint = shutdown.clone();
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for SIGINT");
                return;
            }
            on_signal(&on_sigint, "SIGINT");
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let on_sigterm = shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    return;
                }
            };
            while sigterm.recv().await.is_some() {
                on_signal(&on_sigterm, "SIGTERM");
            }
        });
    }
}

fn on_signal(shutdown: &Shutdown, signal: &'static str) {
    if shutdown.trigger() {
        tracing::info!(signal, "Termination signal received");
    } else {
        tracing::warn!(signal, "Repeated termination signal, exiting without drain");
        std::process::exit(1);
    }
}
