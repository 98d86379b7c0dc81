//! Command-line flags.
//!
//! Flags override values from the optional config file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::{SecretSources, Settings};

#[derive(Parser, Debug)]
#[command(name = "bearer-proxy")]
#[command(version, about = "Reverse proxy that injects a bearer secret and streams responses line by line", long_about = None)]
pub struct Cli {
    /// Optional TOML config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Host/IP to bind to [default: 127.0.0.1]
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on [default: 8080]
    #[arg(long)]
    pub port: Option<u16>,

    /// Seconds open streams may run after a shutdown signal [default: 10]
    #[arg(long, value_name = "SECS")]
    pub drain_timeout_secs: Option<u64>,

    /// Target base URL (e.g. https://api.openai.com)
    #[arg(long)]
    pub target: Option<String>,

    /// Secret key for the Authorization header
    #[arg(long)]
    pub sk: Option<String>,

    /// File containing the secret key
    #[arg(long, value_name = "PATH")]
    pub sk_file: Option<PathBuf>,

    /// Read the secret key from the first line of stdin
    #[arg(long)]
    pub sk_stdin: bool,

    /// Opt-in upstream connect timeout in seconds (no timeout by default)
    #[arg(long, value_name = "SECS")]
    pub connect_timeout_secs: Option<u64>,

    /// Opt-in cap on bytes buffered for a single line before it is flushed
    #[arg(long, value_name = "BYTES")]
    pub max_line_bytes: Option<usize>,

    /// Bind address for the Prometheus metrics endpoint
    #[arg(long, value_name = "ADDR")]
    pub metrics_address: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Overlay the flags that were given onto `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(bind) = &self.bind {
            settings.listener.bind = bind.clone();
        }
        if let Some(port) = self.port {
            settings.listener.port = port;
        }
        if let Some(secs) = self.drain_timeout_secs {
            settings.listener.drain_timeout_secs = secs;
        }
        if let Some(target) = &self.target {
            settings.upstream.target = Some(target.clone());
        }
        if let Some(path) = &self.sk_file {
            settings.upstream.secret_file = Some(path.clone());
        }
        if let Some(secs) = self.connect_timeout_secs {
            settings.upstream.connect_timeout_secs = Some(secs);
        }
        if let Some(bytes) = self.max_line_bytes {
            settings.relay.max_line_bytes = Some(bytes);
        }
        if let Some(addr) = &self.metrics_address {
            settings.observability.metrics_address = Some(addr.clone());
        }
    }

    /// Secret sources as given on the command line and in `settings`.
    pub fn secret_sources(&self, settings: &Settings) -> SecretSources {
        SecretSources {
            literal: self.sk.clone(),
            file: settings.upstream.secret_file.clone(),
            stdin: self.sk_stdin,
        }
    }
}
