//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, /health, /ready)
//!     → request.rs (request ID)
//!     → security gate chain, then routing::Target
//!     → forwarder.rs (upstream call, timeout, failure classification)
//!     → websocket.rs (upgraded connections only)
//!     → response.rs (JSON errors)
//! ```

pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use forwarder::Forwarder;
pub use request::X_REQUEST_ID;
pub use response::{ErrorBody, ProxyError, ProxyOutcome};
pub use server::{AppState, HttpServer, ServerError};
