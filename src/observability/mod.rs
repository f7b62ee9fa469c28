//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every pipeline stage produces:
//!     → logging.rs (structured tracing records: stdout, rotated JSON file)
//!     → metrics.rs (counters, histograms; Prometheus scrape when enabled)
//! ```
//!
//! # Design Decisions
//! - Request ID travels in the `x-request-id` header and appears in records
//! - Recording never blocks or fails the request path

pub mod logging;
pub mod metrics;
