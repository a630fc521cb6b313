//! # Configuration Management System
//!
//! This module provides a hierarchical configuration system for the gateway.
//! It supports loading configuration from multiple sources in order of precedence:
//!
//! 1. **Environment Variables** (highest precedence, prefix `GOGUARD_`)
//! 2. **Environment-specific TOML files** (e.g., `config/production.toml`)
//! 3. **Default TOML file** (`config/default.toml`) (lowest precedence)
//!
//! ## Usage
//!
//! ```rust
//! use gateway_core::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! let port = config.server.port;
//! ```
//!
//! ## Environment Selection
//!
//! The configuration system automatically selects the appropriate environment
//! based on the `GOGUARD_MODE` environment variable:
//!
//! - `development` (default): Uses `config/development.toml`
//! - `testing`: Uses `config/testing.toml`
//! - `production`: Uses `config/production.toml`
//!
//! ## Security Considerations
//!
//! - Provider API keys should be provided via environment variables
//! - Never commit secrets to TOML configuration files

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main configuration structure containing all application settings.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// HTTP server and worker configuration
    pub server: ServerConfig,
    /// Default upstream LLM provider configuration
    pub llm: LlmConfig,
    /// Optional external repository backend (unset = in-memory)
    pub storage: StorageConfig,
    /// Rate limiting and throttling configuration
    pub rate_limit: RateLimitConfig,
    /// Application-level settings and feature flags
    pub app: AppConfig,
    /// Lightweight metrics configuration
    pub metrics: MetricsConfig,
    /// Cross-Origin Resource Sharing (CORS) policies
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

/// Default provider settings, used when a request does not override them.
///
/// Mirrors the `(provider, model, api_key, base_url)` tuple the Settings
/// Provider serves to the pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Backing store for the `users`/`settings` repositories.
///
/// Policies, spending limits, and audit/alerts always stay in-memory
/// regardless of this setting.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// "memory" or "postgres"
    pub backend: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub sslmode: Option<String>,
}

impl StorageConfig {
    pub fn is_postgres(&self) -> bool {
        self.backend.eq_ignore_ascii_case("postgres")
    }

    pub fn connection_string(&self) -> Option<String> {
        if !self.is_postgres() {
            return None;
        }
        Some(format!(
            "postgresql://{}:{}@{}:{}/{}?sslmode={}",
            self.user.as_deref().unwrap_or("postgres"),
            self.password.as_deref().unwrap_or(""),
            self.host.as_deref().unwrap_or("localhost"),
            self.port.unwrap_or(5432),
            self.name.as_deref().unwrap_or("goguard"),
            self.sslmode.as_deref().unwrap_or("prefer"),
        ))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age: Option<u64>,
    pub allow_credentials: bool,
}

impl Config {
    /// Loads configuration from multiple sources in hierarchical order.
    ///
    /// 1. `config/default.toml` (lowest precedence)
    /// 2. `config/{environment}.toml`
    /// 3. Environment variables prefixed `GOGUARD_` (highest precedence)
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("GOGUARD_MODE").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            .add_source(Environment::with_prefix("GOGUARD").separator("_"));

        let config = builder.build()?;
        let loaded_config: Config = config.try_deserialize()?;

        loaded_config.validate(&environment)?;

        Ok(loaded_config)
    }

    /// Validates the loaded configuration and ensures critical requirements are met.
    fn validate(&self, environment: &str) -> Result<(), ConfigError> {
        if self.storage.is_postgres() && self.storage.host.is_none() {
            return Err(ConfigError::Message(
                "storage.backend is \"postgres\" but GOGUARD_DB_HOST is not set".to_string(),
            ));
        }

        if environment == "production" {
            self.validate_production_security()?;
        }

        Ok(())
    }

    /// Validates production-specific security requirements.
    fn validate_production_security(&self) -> Result<(), ConfigError> {
        let error_indicators = [
            "ERROR_", "INSECURE_DEFAULT", "CHANGE_THIS", "NOT_SET",
            "CHECK_ENVIRONMENT", "PLACEHOLDER",
        ];

        if let Some(ref api_key) = self.llm.api_key {
            for indicator in &error_indicators {
                if api_key.contains(indicator) {
                    return Err(ConfigError::Message(format!(
                        "Production deployment detected insecure LLM API key. Set GOGUARD_LLM_API_KEY. Current value contains: {}",
                        indicator
                    )));
                }
            }
        }

        if self.storage.is_postgres() {
            if let Some(ref password) = self.storage.password {
                for indicator in &error_indicators {
                    if password.contains(indicator) {
                        return Err(ConfigError::Message(format!(
                            "Production deployment detected insecure storage password. Set GOGUARD_DB_PASSWORD. Current value contains: {}",
                            indicator
                        )));
                    }
                }
            }
        }

        for origin in &self.cors.allowed_origins {
            if origin == "*" {
                return Err(ConfigError::Message(
                    "Production deployment must not use wildcard (*) CORS origins".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(environment: &str, cors_origin: &str) -> Config {
        Config {
            server: ServerConfig { host: "0.0.0.0".into(), port: 8080, workers: 4 },
            llm: LlmConfig {
                provider: "openai".into(),
                model: "gpt-4o-mini".into(),
                api_key: Some("sk-test-key".into()),
                base_url: None,
            },
            storage: StorageConfig {
                backend: "memory".into(),
                host: None, port: None, user: None, password: None, name: None, sslmode: None,
            },
            rate_limit: RateLimitConfig { requests_per_minute: 60, burst_size: 10 },
            app: AppConfig { environment: environment.into(), log_level: "info".into() },
            metrics: MetricsConfig { enabled: true },
            cors: CorsConfig {
                allowed_origins: vec![cors_origin.to_string()],
                allowed_methods: vec!["GET".into(), "POST".into()],
                allowed_headers: vec!["content-type".into()],
                expose_headers: vec![],
                max_age: Some(3600),
                allow_credentials: false,
            },
        }
    }

    #[test]
    fn development_allows_wildcard_cors() {
        let config = sample_config("development", "*");
        assert!(config.validate("development").is_ok());
    }

    #[test]
    fn production_rejects_wildcard_cors() {
        let config = sample_config("production", "*");
        assert!(config.validate("production").is_err());
    }

    #[test]
    fn production_rejects_placeholder_api_key() {
        let mut config = sample_config("production", "https://app.example.com");
        config.llm.api_key = Some("PLACEHOLDER".into());
        assert!(config.validate("production").is_err());
    }

    #[test]
    fn postgres_backend_requires_host() {
        let mut config = sample_config("development", "*");
        config.storage.backend = "postgres".into();
        assert!(config.validate("development").is_err());
    }

    #[test]
    fn postgres_connection_string_has_expected_shape() {
        let mut config = sample_config("development", "*");
        config.storage.backend = "postgres".into();
        config.storage.host = Some("db.internal".into());
        config.storage.name = Some("goguard".into());
        let conn = config.storage.connection_string().unwrap();
        assert!(conn.starts_with("postgresql://"));
        assert!(conn.contains("db.internal"));
    }
}
