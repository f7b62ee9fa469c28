//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (resolve client IP)
//!     → gate.rs (GateChain, fail-fast):
//!         cors.rs → limits.rs → rate_limit.rs → api_key.rs → ip_allowlist.rs
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple independent gates
//! - Fail closed: reject on any gate failure
//! - Cheap checks first; the first rejection ends evaluation

pub mod api_key;
pub mod cors;
pub mod gate;
pub mod headers;
pub mod ip_allowlist;
pub mod limits;
pub mod rate_limit;

pub use gate::{Gate, GateChain, InboundRequest, Rejection, RejectionKind, Verdict};
