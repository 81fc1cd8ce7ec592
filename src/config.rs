//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Which `ApiClient` implementation backs the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiBackend {
    /// In-process simulated backend.
    Mock,
    /// Real backend over HTTP.
    Http,
}

impl std::str::FromStr for ApiBackend {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::InvalidValue {
                key: "BSS_API_MODE".to_string(),
                message: format!("expected `mock` or `http`, got `{other}`"),
            }),
        }
    }
}

/// How a fresh stable user id is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIdStrategy {
    /// Random v4 UUID.
    Uuid,
    /// `user_` plus eight base36 characters. Lower entropy.
    PseudoRandom,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend implementation to use.
    pub backend: ApiBackend,
    /// Base URL of the HTTP backend (without the `/v1` prefix).
    pub api_base: String,
    /// Directory for durable client storage and export downloads.
    pub data_dir: PathBuf,
    /// Interval between progress hint rotations.
    pub hint_interval: Duration,
    /// Minimum artificial latency of the mock backend.
    pub mock_latency: Duration,
    /// Generation policy for the stable user id.
    pub user_id_strategy: UserIdStrategy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: ApiBackend::Mock,
            api_base: "http://127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from("./data"),
            hint_interval: Duration::from_millis(1800),
            mock_latency: Duration::from_millis(180),
            user_id_strategy: UserIdStrategy::Uuid,
        }
    }
}

impl ClientConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend = match std::env::var("BSS_API_MODE") {
            Ok(mode) => mode.parse()?,
            Err(_) => defaults.backend,
        };

        let api_base = std::env::var("BSS_API_BASE")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base);

        let data_dir = std::env::var("BSS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let hint_interval = env_millis("BSS_HINT_INTERVAL_MS").unwrap_or(defaults.hint_interval);
        let mock_latency = env_millis("BSS_MOCK_LATENCY_MS").unwrap_or(defaults.mock_latency);

        let user_id_strategy = match std::env::var("BSS_USER_ID_STRATEGY").as_deref() {
            Ok("pseudo") => UserIdStrategy::PseudoRandom,
            Ok("uuid") | Err(_) => UserIdStrategy::Uuid,
            Ok(other) => {
                tracing::warn!(value = other, "Unknown BSS_USER_ID_STRATEGY, using uuid");
                UserIdStrategy::Uuid
            }
        };

        Ok(Self {
            backend,
            api_base,
            data_dir,
            hint_interval,
            mock_latency,
            user_id_strategy,
        })
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            tracing::warn!(key = key, value = %raw, "Ignoring non-numeric duration");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.backend, ApiBackend::Mock);
        assert_eq!(config.hint_interval, Duration::from_millis(1800));
        assert_eq!(config.api_base, "http://127.0.0.1:8000");
        assert_eq!(config.user_id_strategy, UserIdStrategy::Uuid);
    }

    #[test]
    fn backend_parse() {
        assert_eq!("mock".parse::<ApiBackend>().unwrap(), ApiBackend::Mock);
        assert_eq!(" HTTP ".parse::<ApiBackend>().unwrap(), ApiBackend::Http);
        assert!("grpc".parse::<ApiBackend>().is_err());
    }
}
