//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted request
//!     → router.rs (Target::resolve)
//!         Static  → upstream base + path + query
//!         Dynamic → absolute URL from the target query parameter
//!     → Forwarder
//! ```
//!
//! # Design Decisions
//! - Reverse and forward mode are two variants behind one interface
//! - Resolution never touches the network
//! - Resolution failures are client errors (400/404), distinct from
//!   forwarding failures (502/504)

pub mod router;

pub use router::{RouteError, Target};
