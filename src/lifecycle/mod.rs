//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Build server → Bind listener → Listening
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Draining (listener closed) → in-flight done or deadline → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown trigger
//! ```
//!
//! # Design Decisions
//! - State lives in one watch channel (state.rs); transitions are forward-only
//! - Drain is bounded by the configured drain timeout

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::Shutdown;
pub use startup::StartupError;
pub use state::{Lifecycle, LifecycleState};
