//! HTTP reverse/forward proxy gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                      EDGE PROXY                       │
//!                    │                                                       │
//!  Client Request    │  ┌─────────┐   ┌──────────────────────────────────┐  │
//!  ──────────────────┼─▶│  http   │──▶│ gate chain                       │  │
//!                    │  │ server  │   │ cors → size → rate → key → ip    │  │
//!                    │  └────┬────┘   └────────────────┬─────────────────┘  │
//!                    │       │ /health /ready          │ admitted           │
//!                    │       ▼                         ▼                    │
//!                    │  ┌─────────┐            ┌──────────────┐             │
//!                    │  │ health  │            │   routing    │             │
//!                    │  └─────────┘            │ static/dyn   │             │
//!                    │                         └──────┬───────┘             │
//!                    │                                ▼                     │
//!  Client Response   │  ┌─────────┐            ┌──────────────┐             │
//!  ◀─────────────────┼──│response │◀───────────│  forwarder   │◀────────────┼──── Upstream
//!                    │  │ (JSON)  │            │ timeout/ws   │             │
//!                    │  └─────────┘            └──────────────┘             │
//!                    │                                                       │
//!                    │  config · lifecycle · observability (logs, metrics)   │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::process::ExitCode;

use clap::Parser;

use edge_proxy::config::CliArgs;
use edge_proxy::lifecycle::{signals, startup, Shutdown};
use edge_proxy::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("edge-proxy: failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-proxy starting");

    let shutdown = Shutdown::new();
    signals::install(&shutdown);

    match startup::run(config, &shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
