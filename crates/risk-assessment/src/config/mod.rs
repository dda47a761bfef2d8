use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::workflows::assessment::SessionTier;

const DEFAULT_FREE_LIMIT: usize = 20;
const DEFAULT_SUGGEST_LIMIT: usize = 30;
const DEFAULT_SUGGEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_STORAGE_CAPACITY: usize = 5 * 1024 * 1024;
const DEFAULT_CLEAR_WINDOW_SECS: i64 = 5;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub assessment: AssessmentConfig,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let free_limit = parse_var("ASSESSMENT_FREE_LIMIT", DEFAULT_FREE_LIMIT)?;
        if free_limit == 0 {
            return Err(ConfigError::InvalidQuota);
        }
        let session_tier = SessionTier::from_label(
            &env::var("ASSESSMENT_SESSION_TIER").unwrap_or_else(|_| "free".to_string()),
        );
        let catalog_source = non_empty_var("ASSESSMENT_CATALOG");
        let clear_window_secs =
            parse_var("ASSESSMENT_CLEAR_WINDOW_SECS", DEFAULT_CLEAR_WINDOW_SECS)?;

        let provider = ProviderConfig {
            endpoint: non_empty_var("ASSESSMENT_SUGGEST_URL"),
            limit: parse_var("ASSESSMENT_SUGGEST_LIMIT", DEFAULT_SUGGEST_LIMIT)?,
            timeout_ms: parse_var("ASSESSMENT_SUGGEST_TIMEOUT_MS", DEFAULT_SUGGEST_TIMEOUT_MS)?,
        };

        let storage = StorageConfig {
            path: non_empty_var("ASSESSMENT_STORAGE_PATH").map(PathBuf::from),
            capacity_bytes: parse_var("ASSESSMENT_STORAGE_CAPACITY", DEFAULT_STORAGE_CAPACITY)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            assessment: AssessmentConfig {
                free_limit,
                session_tier,
                catalog_source,
                clear_window_secs,
            },
            provider,
            storage,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(name) {
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidNumber {
            variable: name,
            value: raw,
        }),
        None => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Engine dials: quota ceiling, starting session tier and catalog location.
#[derive(Debug, Clone)]
pub struct AssessmentConfig {
    pub free_limit: usize,
    pub session_tier: SessionTier,
    pub catalog_source: Option<String>,
    pub clear_window_secs: i64,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            free_limit: DEFAULT_FREE_LIMIT,
            session_tier: SessionTier::Free,
            catalog_source: None,
            clear_window_secs: DEFAULT_CLEAR_WINDOW_SECS,
        }
    }
}

/// External sector-suggestion provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub endpoint: Option<String>,
    pub limit: usize,
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            limit: DEFAULT_SUGGEST_LIMIT,
            timeout_ms: DEFAULT_SUGGEST_TIMEOUT_MS,
        }
    }
}

/// Snapshot persistence location and size ceiling.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
    pub capacity_bytes: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, value: String },
    InvalidQuota,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a number, found '{value}'")
            }
            ConfigError::InvalidQuota => {
                write!(f, "ASSESSMENT_FREE_LIMIT must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidQuota => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "ASSESSMENT_FREE_LIMIT",
            "ASSESSMENT_SESSION_TIER",
            "ASSESSMENT_CATALOG",
            "ASSESSMENT_SUGGEST_URL",
            "ASSESSMENT_SUGGEST_LIMIT",
            "ASSESSMENT_SUGGEST_TIMEOUT_MS",
            "ASSESSMENT_STORAGE_PATH",
            "ASSESSMENT_STORAGE_CAPACITY",
            "ASSESSMENT_CLEAR_WINDOW_SECS",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.assessment.free_limit, 20);
        assert_eq!(config.assessment.session_tier, SessionTier::Free);
        assert!(config.provider.endpoint.is_none());
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn rejects_non_numeric_quota() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ASSESSMENT_FREE_LIMIT", "twenty");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { variable, value }) => {
                assert_eq!(variable, "ASSESSMENT_FREE_LIMIT");
                assert_eq!(value, "twenty");
            }
            other => panic!("expected invalid number, got {other:?}"),
        }
        env::set_var("ASSESSMENT_FREE_LIMIT", "0");
        assert!(matches!(AppConfig::load(), Err(ConfigError::InvalidQuota)));
        reset_env();
    }

    #[test]
    fn reads_premium_tier_and_provider_endpoint() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ASSESSMENT_SESSION_TIER", "Premium");
        env::set_var("ASSESSMENT_SUGGEST_URL", "http://localhost:8080/suggest");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.assessment.session_tier, SessionTier::Premium);
        assert_eq!(
            config.provider.endpoint.as_deref(),
            Some("http://localhost:8080/suggest")
        );
        reset_env();
    }
}
