use chrono::Duration;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

use crate::models::PasswordPolicy;
use crate::utils::Argon2Settings;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub smtp: SmtpConfig,
    pub reset: ResetConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
}

/// Everything the reset flow needs, passed in explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub token_ttl_minutes: i64,
    pub link_base_url: String,
    pub link_path: String,
    pub password_policy: PasswordPolicy,
    pub argon2: Argon2Settings,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 60,
            link_base_url: "http://localhost:3000".to_string(),
            link_path: "/password/reset".to_string(),
            password_policy: PasswordPolicy::default(),
            argon2: Argon2Settings::default(),
        }
    }
}

impl ResetConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::minutes(self.token_ttl_minutes)
    }

    pub fn validate(&self, environment: &Environment) -> Result<(), AppError> {
        if self.token_ttl_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "RESET_TOKEN_TTL_MINUTES must be positive"
            )));
        }

        if self.password_policy.min_length == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PASSWORD_MIN_LENGTH must be positive"
            )));
        }

        if *environment == Environment::Prod && !self.link_base_url.starts_with("https://") {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "RESET_LINK_BASE_URL must use https in production"
            )));
        }

        Ok(())
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let defaults = ResetConfig::default();
        let default_argon2 = Argon2Settings::default();

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("healthdir-auth"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", None, is_prod)?,
                port: parse_env("SMTP_PORT", "587", is_prod)?,
                user: get_env("SMTP_USER", None, is_prod)?,
                password: get_env("SMTP_PASSWORD", None, is_prod)?,
                from: get_env("SMTP_FROM", None, is_prod)?,
            },
            reset: ResetConfig {
                token_ttl_minutes: parse_env("RESET_TOKEN_TTL_MINUTES", "60", is_prod)?,
                link_base_url: get_env("RESET_LINK_BASE_URL", Some(defaults.link_base_url.as_str()), is_prod)?,
                link_path: get_env("RESET_LINK_PATH", Some(defaults.link_path.as_str()), is_prod)?,
                password_policy: PasswordPolicy {
                    min_length: parse_env("PASSWORD_MIN_LENGTH", "8", is_prod)?,
                    require_uppercase: parse_env("PASSWORD_REQUIRE_UPPERCASE", "true", is_prod)?,
                    require_number: parse_env("PASSWORD_REQUIRE_NUMBER", "true", is_prod)?,
                    require_special: parse_env("PASSWORD_REQUIRE_SPECIAL", "false", is_prod)?,
                },
                argon2: Argon2Settings {
                    memory_kib: parse_env(
                        "ARGON2_MEMORY_KIB",
                        &default_argon2.memory_kib.to_string(),
                        is_prod,
                    )?,
                    iterations: parse_env(
                        "ARGON2_ITERATIONS",
                        &default_argon2.iterations.to_string(),
                        is_prod,
                    )?,
                    parallelism: parse_env(
                        "ARGON2_PARALLELISM",
                        &default_argon2.parallelism.to_string(),
                        is_prod,
                    )?,
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS cannot exceed DATABASE_MAX_CONNECTIONS"
            )));
        }

        self.reset.validate(&self.environment)
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "healthdir-auth".to_string(),
            service_version: "test".to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "postgres://localhost/healthdir".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            smtp: SmtpConfig {
                host: "smtp.example.com".to_string(),
                port: 587,
                user: "noreply@example.com".to_string(),
                password: "secret".to_string(),
                from: "noreply@example.com".to_string(),
            },
            reset: ResetConfig::default(),
        }
    }

    #[test]
    fn test_default_reset_config() {
        let reset = ResetConfig::default();
        assert_eq!(reset.token_ttl(), Duration::minutes(60));
        assert!(reset.validate(&Environment::Dev).is_ok());
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let mut cfg = config();
        cfg.reset.token_ttl_minutes = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_min_length_rejected() {
        let mut cfg = config();
        cfg.reset.password_policy.min_length = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_prod_requires_https_links() {
        let mut cfg = config();
        cfg.environment = Environment::Prod;
        assert!(cfg.validate().is_err());

        cfg.reset.link_base_url = "https://annuaire.example".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_pool_bounds_checked() {
        let mut cfg = config();
        cfg.database.min_connections = 20;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert!("staging".parse::<Environment>().is_err());
    }
}
