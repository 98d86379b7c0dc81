//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all route, request span)
//!     → request.rs (upstream URL, Host, Authorization, body passthrough)
//!     → relay (send upstream, stream the body line by line)
//!     → response.rs (status + headers onto the client response)
//!     → Send to client
//! ```
//!
//! Failures on the way are `error.rs` values, rendered as plain-text responses.

pub mod error;
pub mod request;
pub mod response;
pub mod server;

pub use error::ProxyError;
pub use server::{HttpServer, ServerOptions};
