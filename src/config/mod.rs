//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI flags (cli.rs) + optional TOML file (loader.rs)
//!     → Settings (schema.rs, defaults for everything optional)
//!     → validation.rs (semantic checks, all errors reported)
//!     → secret.rs (exactly one source read, trimmed)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to every request handler
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields but the target and the secret have defaults
//! - Any error here is fatal before a socket is bound

pub mod cli;
pub mod loader;
pub mod schema;
pub mod secret;
pub mod validation;

pub use cli::Cli;
pub use loader::{ConfigError, ProxyConfig};
pub use schema::{ListenerConfig, RelayConfig, Settings, UpstreamConfig};
pub use secret::{Secret, SecretSource};
