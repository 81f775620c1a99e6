//! Runtime configuration.
//!
//! Sources, lowest priority first: built-in defaults, `config/default.toml`,
//! a `.env` file, `DIESEL_*` environment variables. CLI flags override last.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_ALERT_THRESHOLD_PCT: f64 = 5.0;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Margins whose absolute value is above this are flagged out of limit.
    #[serde(default = "default_threshold")]
    pub alert_threshold_pct: f64,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alert_threshold_pct: default_threshold(),
            database_path: default_database_path(),
            server: ServerConfig::default(),
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_ALERT_THRESHOLD_PCT
}

fn default_database_path() -> PathBuf {
    PathBuf::from("diesel.db")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load from `config/default.toml` (optional), `.env` and `DIESEL_*` variables.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("DIESEL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()
    }

    pub fn with_threshold(mut self, threshold_pct: f64) -> Result<Self> {
        self.alert_threshold_pct = threshold_pct;
        self.validate()
    }

    pub fn with_database_path(mut self, path: PathBuf) -> Self {
        self.database_path = path;
        self
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn validate(self) -> Result<Self> {
        let t = self.alert_threshold_pct;
        if !t.is_finite() || !(0.0..=100.0).contains(&t) {
            return Err(Error::invalid(
                "alert_threshold_pct",
                format!("{} must be between 0 and 100", t),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.alert_threshold_pct, 5.0);
        assert_eq!(config.database_path, PathBuf::from("diesel.db"));
        assert_eq!(config.server_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_threshold_override_is_validated() {
        let config = Config::default().with_threshold(2.5).unwrap();
        assert_eq!(config.alert_threshold_pct, 2.5);

        assert!(Config::default().with_threshold(-1.0).is_err());
        assert!(Config::default().with_threshold(100.5).is_err());
        assert!(Config::default().with_threshold(f64::NAN).is_err());
        assert!(Config::default().with_threshold(0.0).is_ok());
    }

    #[test]
    fn test_deserialize_partial_toml_source() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                "alert_threshold_pct = 7.5\n[server]\nport = 8081\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let config: Config = settings.try_deserialize().unwrap();
        assert_eq!(config.alert_threshold_pct, 7.5);
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database_path, PathBuf::from("diesel.db"));
    }

    // Environment variables are process-wide; tests touching them take this lock.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn test_load_applies_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("DIESEL_ALERT_THRESHOLD_PCT", "7.5");
        std::env::set_var("DIESEL_SERVER__PORT", "8081");

        let loaded = Config::load();

        std::env::remove_var("DIESEL_ALERT_THRESHOLD_PCT");
        std::env::remove_var("DIESEL_SERVER__PORT");

        let config = loaded.unwrap();
        assert_eq!(config.alert_threshold_pct, 7.5);
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_rejects_out_of_range_env_threshold() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("DIESEL_ALERT_THRESHOLD_PCT", "150");

        let loaded = Config::load();

        std::env::remove_var("DIESEL_ALERT_THRESHOLD_PCT");

        let err = loaded.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { ref field, .. } if field == "alert_threshold_pct"));
    }
}
