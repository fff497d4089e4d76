//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SCRIM_QUEUE_CONFIG_PATH";
/// Environment variable that overrides the token secret from the file.
const TOKEN_SECRET_ENV: &str = "SCRIM_QUEUE_TOKEN_SECRET";

/// Development-only signing secret used when nothing is configured.
const DEFAULT_TOKEN_SECRET: &str = "dev-secret-change-me";
/// Access tokens live this long.
const DEFAULT_TOKEN_TTL_MINUTES: u64 = 30;
/// Open posts expire this long after creation.
const DEFAULT_POST_TTL_MINUTES: u64 = 30;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    token_secret: Vec<u8>,
    token_ttl: Duration,
    post_ttl: Duration,
    allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to
    /// baked-in defaults, then apply environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Ok(secret) = env::var(TOKEN_SECRET_ENV)
            && !secret.is_empty()
        {
            config.token_secret = secret.into_bytes();
        }
        config
    }

    /// HMAC secret for access-token signing and verification.
    pub fn token_secret(&self) -> &[u8] {
        &self.token_secret
    }

    /// Lifetime of minted access tokens.
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// How long an open post accepts joins before expiring.
    pub fn post_ttl(&self) -> Duration {
        self.post_ttl
    }

    /// CORS origins allowed by the HTTP layer.
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            token_secret: DEFAULT_TOKEN_SECRET.as_bytes().to_vec(),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_MINUTES * 60),
            post_ttl: Duration::from_secs(DEFAULT_POST_TTL_MINUTES * 60),
            allowed_origins: default_origins(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    token_secret: Option<String>,
    token_ttl_minutes: Option<u64>,
    post_ttl_minutes: Option<u64>,
    allowed_origins: Option<Vec<String>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            token_secret: value
                .token_secret
                .map(String::into_bytes)
                .unwrap_or(defaults.token_secret),
            token_ttl: value
                .token_ttl_minutes
                .map(|minutes| Duration::from_secs(minutes * 60))
                .unwrap_or(defaults.token_ttl),
            post_ttl: value
                .post_ttl_minutes
                .map(|minutes| Duration::from_secs(minutes * 60))
                .unwrap_or(defaults.post_ttl),
            allowed_origins: value.allowed_origins.unwrap_or(defaults.allowed_origins),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Frontend dev-server origins allowed by default.
fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".into(),
        "http://localhost:3000".into(),
        "http://127.0.0.1:5173".into(),
        "http://127.0.0.1:3000".into(),
    ]
}
