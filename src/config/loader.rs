//! Configuration loading and secret resolution.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::config::schema::{SecretSources, Settings};
use crate::config::secret::Secret;
use crate::config::validation::{validate_secret, validate_settings, ValidationError};

/// Error type for configuration loading. Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read secret file {path:?}: {source}")]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read secret from stdin: {0}")]
    SecretStdin(#[source] std::io::Error),
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The immutable upstream description shared by every request.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Absolute base URL; only scheme, host and port are used.
    pub target: Url,
    /// Credential injected as `Authorization: Bearer <secret>`.
    pub secret: Secret,
}

impl ProxyConfig {
    /// Build a config directly, for embedding and tests.
    ///
    /// Runs the same semantic checks as startup resolution.
    pub fn new(target: &str, secret: impl AsRef<str>) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        settings.upstream.target = Some(target.to_string());
        let sources = SecretSources {
            literal: Some(secret.as_ref().to_string()),
            ..Default::default()
        };
        resolve(&settings, &sources, std::io::empty())
    }

    /// Wrap in an `Arc` for sharing across handlers.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// Load settings from an optional TOML file, falling back to defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let settings: Settings = toml::from_str(&content)?;

    tracing::debug!(path = ?path, "Config file loaded");
    Ok(settings)
}

/// Validate settings, read the secret and produce the immutable [`ProxyConfig`].
///
/// Stdin is only consumed when every other check has passed and stdin is the
/// selected source.
pub fn resolve<R: BufRead>(
    settings: &Settings,
    sources: &SecretSources,
    stdin: R,
) -> Result<ProxyConfig, ConfigError> {
    let validated = validate_settings(settings, sources).map_err(ConfigError::Validation)?;

    let secret = validated.secret_source.read(stdin)?;
    validate_secret(&secret).map_err(|e| ConfigError::Validation(vec![e]))?;

    tracing::info!(
        upstream = %validated.target,
        secret_source = validated.secret_source.kind(),
        "Upstream configured"
    );

    Ok(ProxyConfig {
        target: validated.target,
        secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn missing_file_is_io_error() {
        let err = load_settings(Some(Path::new("/no/such/bearer-proxy.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn no_file_means_defaults() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.listener.port, 8080);
    }

    #[test]
    fn file_is_parsed() {
        let path = std::env::temp_dir().join(format!("bearer-proxy-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
            [listener]
            port = 9191

            [upstream]
            target = "https://api.example.com"
            connect_timeout_secs = 3

            [relay]
            max_line_bytes = 4096
            "#,
        )
        .unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.listener.port, 9191);
        assert_eq!(settings.listener.bind, "127.0.0.1");
        assert_eq!(settings.upstream.connect_timeout_secs, Some(3));
        assert_eq!(settings.relay.max_line_bytes, Some(4096));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let path = std::env::temp_dir().join(format!("bearer-proxy-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[listener\nport = ").unwrap();

        let err = load_settings(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn resolves_from_stdin() {
        let mut settings = Settings::default();
        settings.upstream.target = Some("http://localhost:9999".to_string());
        let sources = SecretSources {
            stdin: true,
            ..Default::default()
        };

        let config = resolve(&settings, &sources, Cursor::new("abc\n")).unwrap();
        assert_eq!(config.secret.expose(), "abc");
        assert_eq!(config.target.as_str(), "http://localhost:9999/");
    }

    #[test]
    fn empty_stdin_fails_validation() {
        let mut settings = Settings::default();
        settings.upstream.target = Some("http://localhost:9999".to_string());
        let sources = SecretSources {
            stdin: true,
            ..Default::default()
        };

        let err = resolve(&settings, &sources, Cursor::new("\n")).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(ref errors) if errors == &[ValidationError::EmptySecret])
        );
    }

    #[test]
    fn invalid_settings_never_touch_stdin() {
        struct Untouchable;
        impl std::io::Read for Untouchable {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                panic!("stdin must not be read");
            }
        }

        let sources = SecretSources {
            stdin: true,
            ..Default::default()
        };
        let err = resolve(
            &Settings::default(),
            &sources,
            std::io::BufReader::new(Untouchable),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no target URL"));
    }

    #[test]
    fn new_checks_target_and_secret() {
        assert!(ProxyConfig::new("http://localhost:9999", "abc").is_ok());
        assert!(ProxyConfig::new("not a url", "abc").is_err());
        assert!(ProxyConfig::new("http://localhost:9999", "  ").is_err());
    }
}
