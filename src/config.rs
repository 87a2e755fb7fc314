use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub limiter: LimiterConfig,

    pub smtp: SmtpConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// "pretty" (default) or "json"
    pub log_format: String,

    /// Number of tokio worker threads (0 = number of CPU cores)
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// development | staging | production
    pub env: String,

    pub cors_trusted_origins: Vec<String>,

    /// How long shutdown waits for background tasks before giving up.
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            env: "development".to_string(),
            cors_trusted_origins: Vec::new(),
            shutdown_grace_seconds: 5,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,

    pub max_connections: u32,

    pub min_connections: u32,

    pub idle_timeout_seconds: u64,

    /// Upper bound for every individual store call.
    pub query_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/greenlight.db".to_string(),
            max_connections: 25,
            min_connections: 1,
            idle_timeout_seconds: 15 * 60,
            query_timeout_seconds: 3,
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub enabled: bool,

    /// Sustained requests per second per client IP.
    pub rps: f64,

    /// Bucket capacity per client IP.
    pub burst: u32,

    pub sweep_interval_seconds: u64,

    /// Clients idle for longer than `idle_multiplier * sweep_interval` are evicted.
    pub idle_multiplier: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: 2.0,
            burst: 4,
            sweep_interval_seconds: 60,
            idle_multiplier: 3,
        }
    }
}

impl LimiterConfig {
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    #[must_use]
    pub fn idle_threshold(&self) -> Duration {
        self.sweep_interval() * self.idle_multiplier
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    /// Relay host. Empty disables delivery; mails are then only recorded by
    /// recipient and template.
    pub host: String,

    pub port: u16,

    pub username: String,

    #[serde(skip_serializing)]
    pub password: String,

    pub sender: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 25,
            username: String::new(),
            password: String::new(),
            sender: "Greenlight <no-reply@greenlight.local>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            limiter: LimiterConfig::default(),
            smtp: SmtpConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GREENLIGHT_DB_URL")
            && !url.is_empty()
        {
            self.database.url = url;
        }
        if let Ok(password) = std::env::var("GREENLIGHT_SMTP_PASSWORD") {
            self.smtp.password = password;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("greenlight").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".greenlight").join("config.toml"));
        }

        paths
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = PathBuf::from("config.toml");
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if !(self.limiter.rps.is_finite() && self.limiter.rps > 0.0) {
            anyhow::bail!("Limiter rps must be a positive number");
        }

        if self.limiter.burst == 0 {
            anyhow::bail!("Limiter burst must be at least 1");
        }

        if self.database.query_timeout_seconds == 0 {
            anyhow::bail!("Database query timeout must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 4000);
        assert!(config.limiter.enabled);
        assert_eq!(config.limiter.burst, 4);
        assert_eq!(config.limiter.idle_threshold(), Duration::from_secs(180));
        assert_eq!(config.database.query_timeout(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[limiter]"));
        assert!(toml_str.contains("[database]"));
        assert!(!toml_str.contains("password"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [limiter]
            enabled = false
            rps = 10.5
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert!(!config.limiter.enabled);
        assert!((config.limiter.rps - 10.5).abs() < f64::EPSILON);
        assert_eq!(config.limiter.burst, 4);
        assert_eq!(config.server.env, "development");
    }

    #[test]
    fn test_smtp_section() {
        let toml_str = r#"
            [smtp]
            host = "smtp.mailtrap.io"
            port = 2525
            username = "user"
            password = "secret"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.smtp.host, "smtp.mailtrap.io");
        assert_eq!(config.smtp.port, 2525);
        assert_eq!(config.smtp.password, "secret");
        assert!(config.smtp.sender.contains("Greenlight"));
        assert!(Config::default().smtp.host.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_limiter() {
        let mut config = Config::default();
        config.limiter.rps = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limiter.burst = 0;
        assert!(config.validate().is_err());
    }
}
