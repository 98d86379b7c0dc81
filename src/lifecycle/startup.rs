//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Read the secret
//! - Initialize subsystems in dependency order
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener is bound last (traffic only when ready)

use std::io::BufRead;

use tokio::net::TcpListener;

use crate::config::loader::{load_settings, resolve};
use crate::config::{Cli, ConfigError, ProxyConfig, Settings};
use crate::http::{HttpServer, ServerOptions};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

/// Merge the config file with the flags and resolve the upstream config.
///
/// `stdin` is only read when `--sk-stdin` is the chosen secret source.
pub fn prepare<R: BufRead>(cli: &Cli, stdin: R) -> Result<(Settings, ProxyConfig), ConfigError> {
    let mut settings = load_settings(cli.config.as_deref())?;
    cli.apply(&mut settings);

    let sources = cli.secret_sources(&settings);
    let config = resolve(&settings, &sources, stdin)?;

    Ok((settings, config))
}

/// Run the proxy until a termination signal arrives.
pub async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (settings, config) = prepare(&cli, std::io::stdin().lock())?;

    tracing::info!(
        bind = %settings.listener.bind,
        port = settings.listener.port,
        connect_timeout_secs = ?settings.upstream.connect_timeout_secs,
        max_line_bytes = ?settings.relay.max_line_bytes,
        "Configuration loaded"
    );

    if let Some(addr) = settings.observability.metrics_address.as_deref() {
        let addr = addr.parse::<std::net::SocketAddr>()?;
        metrics::init_metrics(addr)
            .map_err(|e| format!("failed to start metrics endpoint on {}: {}", addr, e))?;
    }

    let server = HttpServer::new(config.shared(), ServerOptions::from_settings(&settings))?;

    let listener = TcpListener::bind(settings.listener.address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
