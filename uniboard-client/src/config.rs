//! Configuration loading for the Uniboard client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::time::Duration;
use uniboard_core::UserIdentity;
use uniboard_engine::EngineConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub push_endpoint: String,
    /// Session user; push events for anyone else are dropped client-side.
    pub session_email: String,
    pub is_admin: bool,
    pub request_timeout_ms: u64,
    pub debounce: DebounceConfig,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebounceConfig {
    /// Window for whole-entity detail refreshes.
    pub detail_ms: u64,
    /// Window for per-cell data refreshes.
    pub cell_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
    /// Consecutive failed connects before the channel gives up.
    pub max_attempts: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or UNIBOARD_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.push_endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "push_endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if self.session_email.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "session_email",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.debounce.detail_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "debounce.detail_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.debounce.cell_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "debounce.cell_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reconnect.initial_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.initial_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reconnect.max_ms < self.reconnect.initial_ms {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_ms",
                reason: "must be >= initial_ms".to_string(),
            });
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_attempts",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Engine configuration derived from this client config.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(self.session_email.clone());
        config.detail_debounce = Duration::from_millis(self.debounce.detail_ms);
        config.cell_debounce = Duration::from_millis(self.debounce.cell_ms);
        config
    }

    /// The session user as the engine needs to know them.
    pub fn user(&self) -> UserIdentity {
        UserIdentity {
            email: self.session_email.clone(),
            is_admin: self.is_admin,
        }
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("UNIBOARD_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_config() -> ClientConfig {
        ClientConfig {
            api_base_url: "http://localhost:8080".to_string(),
            push_endpoint: "ws://localhost:8080/ws".to_string(),
            session_email: "me@example.com".to_string(),
            is_admin: false,
            request_timeout_ms: 5_000,
            debounce: DebounceConfig {
                detail_ms: 500,
                cell_ms: 1_000,
            },
            reconnect: ReconnectConfig {
                initial_ms: 250,
                max_ms: 5_000,
                multiplier: 1.5,
                jitter_ms: 100,
                max_attempts: 8,
            },
        }
    }

    #[test]
    fn test_base_config_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_empty_email_rejected() {
        let mut config = base_config();
        config.session_email = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_debounce_rejected() {
        let mut config = base_config();
        config.debounce.cell_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_bounds_enforced() {
        let mut config = base_config();
        config.reconnect.max_ms = 10;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.reconnect.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path_parses_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
api_base_url = "http://localhost:8080"
push_endpoint = "ws://localhost:8080/ws"
session_email = "me@example.com"
is_admin = true
request_timeout_ms = 5000

[debounce]
detail_ms = 500
cell_ms = 1000

[reconnect]
initial_ms = 250
max_ms = 5000
multiplier = 1.5
jitter_ms = 100
max_attempts = 8
"#
        )
        .unwrap();

        let config = ClientConfig::from_path(file.path()).unwrap();
        assert!(config.is_admin);
        assert_eq!(config.debounce.cell_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = toml::from_str::<ClientConfig>("nonsense = 1").unwrap_err();
        assert!(err.to_string().contains("nonsense") || !err.to_string().is_empty());
    }

    #[test]
    fn test_engine_config_carries_debounce_windows() {
        let config = base_config().engine_config();
        assert_eq!(config.detail_debounce, Duration::from_millis(500));
        assert_eq!(config.cell_debounce, Duration::from_millis(1_000));
        assert_eq!(config.session_email, "me@example.com");
    }
}
