//! Upstream secret handling.
//!
//! The secret is resolved once at startup from exactly one source and then
//! only ever leaves the process inside the outbound `Authorization` header.

use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use axum::http::header::{HeaderValue, InvalidHeaderValue};

use crate::config::loader::ConfigError;
use crate::config::schema::SecretSources;

const BEARER_PREFIX: &str = "Bearer ";

/// Opaque upstream credential.
///
/// `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw value, trimming surrounding whitespace.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw secret. Only the request builder should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Bearer <secret>`, flagged sensitive so it is never logged by `http`.
    pub fn bearer_header(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("{}{}", BEARER_PREFIX, self.0))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(**redacted**)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("**redacted**")
    }
}

/// The single source a secret is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    Literal(String),
    File(PathBuf),
    Stdin,
}

impl SecretSource {
    /// Pick a source by precedence: literal, then file, then stdin.
    ///
    /// Returns `None` when no source was given at all.
    pub fn select(sources: &SecretSources) -> Option<Self> {
        let given = [
            sources.literal.is_some(),
            sources.file.is_some(),
            sources.stdin,
        ]
        .iter()
        .filter(|given| **given)
        .count();

        let selected = if let Some(literal) = &sources.literal {
            Self::Literal(literal.clone())
        } else if let Some(path) = &sources.file {
            Self::File(path.clone())
        } else if sources.stdin {
            Self::Stdin
        } else {
            return None;
        };

        if given > 1 {
            tracing::warn!(
                source = selected.kind(),
                "Multiple secret sources given; using the highest-precedence one"
            );
        }

        Some(selected)
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::File(_) => "file",
            Self::Stdin => "stdin",
        }
    }

    /// Read the secret. `stdin` is only touched for [`SecretSource::Stdin`],
    /// and only its first line is consumed.
    pub fn read<R: BufRead>(&self, stdin: R) -> Result<Secret, ConfigError> {
        match self {
            Self::Literal(value) => Ok(Secret::new(value)),
            Self::File(path) => read_file(path),
            Self::Stdin => read_first_line(stdin),
        }
    }
}

fn read_file(path: &Path) -> Result<Secret, ConfigError> {
    std::fs::read_to_string(path)
        .map(Secret::new)
        .map_err(|source| ConfigError::SecretFile {
            path: path.to_path_buf(),
            source,
        })
}

fn read_first_line<R: BufRead>(mut stdin: R) -> Result<Secret, ConfigError> {
    let mut line = String::new();
    stdin
        .read_line(&mut line)
        .map_err(ConfigError::SecretStdin)?;
    Ok(Secret::new(line))
}
