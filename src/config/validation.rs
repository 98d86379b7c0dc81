//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde and clap handle syntactic)
//! - Parse the target into an absolute `http`/`https` URL
//! - Check that exactly one secret source can be chosen
//! - Check the resolved secret can travel in a header
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before any secret is read and before any socket is bound

use thiserror::Error;
use url::Url;

use crate::config::schema::{SecretSources, Settings};
use crate::config::secret::{Secret, SecretSource};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no target URL given (use --target or upstream.target)")]
    MissingTarget,
    #[error("invalid target URL {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },
    #[error("target URL {0:?} must use http or https")]
    UnsupportedScheme(String),
    #[error("no secret source given (use one of --sk, --sk-file or --sk-stdin)")]
    MissingSecret,
    #[error("secret is empty after trimming whitespace")]
    EmptySecret,
    #[error("secret contains characters not allowed in an HTTP header")]
    SecretNotHeaderSafe,
    #[error("bind address must not be empty")]
    EmptyBindAddress,
    #[error("max_line_bytes must be greater than zero")]
    ZeroMaxLineBytes,
    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),
}

/// What validation hands back once the settings are acceptable.
#[derive(Debug)]
pub struct Validated {
    pub target: Url,
    pub secret_source: SecretSource,
}

/// Validate everything that can be checked without reading the secret.
pub fn validate_settings(
    settings: &Settings,
    sources: &SecretSources,
) -> Result<Validated, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.listener.bind.trim().is_empty() {
        errors.push(ValidationError::EmptyBindAddress);
    }

    if settings.relay.max_line_bytes == Some(0) {
        errors.push(ValidationError::ZeroMaxLineBytes);
    }

    if let Some(addr) = settings.observability.metrics_address.as_deref() {
        if addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.to_string()));
        }
    }

    let target = match settings.upstream.target.as_deref() {
        Some(raw) => match parse_target(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                errors.push(e);
                None
            }
        },
        None => {
            errors.push(ValidationError::MissingTarget);
            None
        }
    };

    let secret_source = SecretSource::select(sources);
    if secret_source.is_none() {
        errors.push(ValidationError::MissingSecret);
    }

    match (target, secret_source) {
        (Some(target), Some(secret_source)) if errors.is_empty() => Ok(Validated {
            target,
            secret_source,
        }),
        _ => Err(errors),
    }
}

/// Validate a secret after it has been read.
pub fn validate_secret(secret: &Secret) -> Result<(), ValidationError> {
    if secret.is_empty() {
        return Err(ValidationError::EmptySecret);
    }
    secret
        .bearer_header()
        .map(|_| ())
        .map_err(|_| ValidationError::SecretNotHeaderSafe)
}

fn parse_target(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw.trim()).map_err(|e| ValidationError::InvalidTarget {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::UnsupportedScheme(raw.to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::InvalidTarget {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(url)
}
