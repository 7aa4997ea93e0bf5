use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheConfig, MemoryCacheConfig};
use crate::pipeline::PipelineConfig;
use crate::ranking::{DiversityConfig, RankingConfig};
use crate::rules::{MatchMode, RuleStoreConfig};
use crate::scheduler::SchedulerConfig;
use crate::scoring::ScoringConfig;

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

/// Top-level configuration for the ranking service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub rules: RuleStoreConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub pipeline: PipelineConfig,
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

        let match_mode = match env::var("RULE_MATCH_MODE") {
            Ok(raw) => MatchMode::parse(&raw).ok_or(ConfigError::InvalidMatchMode(raw))?,
            Err(_) => MatchMode::default(),
        };
        let rules = RuleStoreConfig {
            source_path: env::var("RULES_PATH").ok().map(PathBuf::from),
            ttl: Duration::from_secs(parse_var("RULES_TTL_SECS", 300)?),
            match_mode,
        };

        let max_memory_mb: usize = parse_var("CACHE_MAX_MEMORY_MB", 100)?;
        let cache = CacheConfig {
            memory: MemoryCacheConfig {
                max_entries: parse_var("CACHE_MAX_ENTRIES", 1000)?,
                max_memory_bytes: max_memory_mb.checked_mul(1024 * 1024).ok_or_else(|| {
                    ConfigError::InvalidNumber {
                        key: "CACHE_MAX_MEMORY_MB",
                        value: max_memory_mb.to_string(),
                    }
                })?,
            },
            sweep_interval: Duration::from_secs(parse_var("CACHE_SWEEP_SECS", 60)?),
        };

        let scheduler = SchedulerConfig {
            max_concurrent_tasks: parse_var("SCHEDULER_MAX_CONCURRENT", 100)?,
            ..SchedulerConfig::default()
        };

        let diversity = if parse_bool("RANKING_DIVERSITY", true)? {
            Some(DiversityConfig {
                max_same_brand: parse_var("RANKING_MAX_SAME_BRAND", 3)?,
                max_same_category: parse_var("RANKING_MAX_SAME_CATEGORY", 4)?,
            })
        } else {
            None
        };

        let pipeline = PipelineConfig {
            request_timeout: Duration::from_millis(parse_var("REQUEST_TIMEOUT_MS", 5000)?),
            scoring: ScoringConfig {
                normalize: parse_bool("SCORING_NORMALIZE", false)?,
            },
            ranking: RankingConfig {
                diversity,
                ..RankingConfig::default()
            },
            cache_sweep_interval: cache.sweep_interval,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            rules,
            cache,
            scheduler,
            pipeline,
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key, value: raw }),
        },
        Err(_) => Ok(default),
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidFlag { key: &'static str, value: String },
    InvalidMatchMode(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be a boolean flag, got '{value}'")
            }
            ConfigError::InvalidMatchMode(value) => {
                write!(f, "RULE_MATCH_MODE must be 'any' or 'all', got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

/// Serializes tests that touch process environment variables.
#[cfg(test)]
pub(crate) fn env_guard() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock, PoisonError};

    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    GUARD
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}
