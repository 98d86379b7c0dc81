//! Bearer-injecting streaming reverse proxy library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::ProxyConfig;
pub use http::{HttpServer, ServerOptions};
pub use lifecycle::Shutdown;
