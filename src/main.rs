//! Bearer proxy
//!
//! Forwards every request to one fixed upstream, injecting
//! `Authorization: Bearer <secret>`, and streams the response back one line
//! at a time.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ http::request ──▶ reqwest client ──────▶ Upstream
//!                      (catch-all)     (URL, Host,
//!                                       Authorization)
//!
//!     Client Response
//!     ◀────────────── relay::writer ◀── relay::scanner ◀── http::response ◀──── Upstream
//!                      (flush per line)  (split on \n)      (status, headers)
//!
//!     Cross-cutting: config (CLI + TOML + secret), observability, lifecycle
//! ```

use clap::Parser;

use bearer_proxy::config::Cli;
use bearer_proxy::lifecycle::startup;
use bearer_proxy::observability::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    tracing::info!("bearer-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = startup::run(cli).await {
        tracing::error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}
