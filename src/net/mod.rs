//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.rs  bind the configured address
//!     → axum::serve accepts connections
//!     → connection.rs counts requests in flight (drain, /health)
//! ```

pub mod connection;
pub mod listener;

pub use connection::{InFlightGuard, InFlightTracker};
pub use listener::{bind, ListenerError};
