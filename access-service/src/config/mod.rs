use secrecy::{ExposeSecret, SecretString};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::models::DEFAULT_REGISTRY_SESSION_EXPIRY_MINUTES;
use crate::services::{SessionStrategy, DEFAULT_IAP_HEADER, DEFAULT_IAP_JWKS_URL};

/// Minimum length of the HMAC signing secret, in bytes.
pub const MIN_TOKEN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct AccessConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub tokens: TokenConfig,
    pub iap: IapConfig,
    pub sessions: SessionConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: SecretString,
    /// Static token that authenticates as the site administrator.
    pub site_token: Option<SecretString>,
    pub registry_session_expiry_minutes: i64,
    pub user_token_expiry_days: i64,
}

#[derive(Debug, Clone)]
pub struct IapConfig {
    pub audience: Option<String>,
    pub header: String,
    pub jwks_url: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub strategy: SessionStrategy,
    pub lifetime_minutes: i64,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub ui_prefix: String,
    pub login_path: String,
    pub authenticated_prefixes: Vec<String>,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AccessConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("access-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            tokens: TokenConfig {
                secret: SecretString::new(get_env("TOKEN_SECRET", None, is_prod)?),
                site_token: get_optional_env("SITE_TOKEN").map(SecretString::new),
                registry_session_expiry_minutes: parse_env(
                    "REGISTRY_SESSION_EXPIRY_MINUTES",
                    &DEFAULT_REGISTRY_SESSION_EXPIRY_MINUTES.to_string(),
                    is_prod,
                )?,
                user_token_expiry_days: parse_env("USER_TOKEN_EXPIRY_DAYS", "365", is_prod)?,
            },
            iap: IapConfig {
                audience: get_optional_env("IAP_AUDIENCE"),
                header: get_env("IAP_HEADER", Some(DEFAULT_IAP_HEADER), is_prod)?,
                jwks_url: get_env("IAP_JWKS_URL", Some(DEFAULT_IAP_JWKS_URL), is_prod)?,
            },
            sessions: SessionConfig {
                strategy: get_env("SESSION_STRATEGY", Some("stateful"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                lifetime_minutes: parse_env("SESSION_LIFETIME_MINUTES", "1440", is_prod)?,
                sweep_interval_seconds: parse_env("SESSION_SWEEP_INTERVAL_SECONDS", "300", is_prod)?,
            },
            http: HttpConfig {
                ui_prefix: get_env("UI_PREFIX", Some("/app"), is_prod)?,
                login_path: get_env("LOGIN_PATH", Some("/login"), is_prod)?,
                authenticated_prefixes: get_env(
                    "AUTHENTICATED_PREFIXES",
                    Some("/api/,/app/"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
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

        if self.tokens.secret.expose_secret().len() < MIN_TOKEN_SECRET_LEN {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_SECRET must be at least {} bytes",
                MIN_TOKEN_SECRET_LEN
            )));
        }

        if self
            .tokens
            .site_token
            .as_ref()
            .is_some_and(|t| t.expose_secret().is_empty())
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SITE_TOKEN must not be empty when set"
            )));
        }

        if self.tokens.registry_session_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REGISTRY_SESSION_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.tokens.user_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "USER_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if self.sessions.lifetime_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_LIFETIME_MINUTES must be positive"
            )));
        }

        if self.sessions.sweep_interval_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_SWEEP_INTERVAL_SECONDS must be positive"
            )));
        }

        let ui_root = format!("{}/", self.http.ui_prefix.trim_end_matches('/'));
        if !self.is_authenticated_path(&ui_root) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "UI_PREFIX {} is not covered by AUTHENTICATED_PREFIXES",
                self.http.ui_prefix
            )));
        }

        if self.is_authenticated_path(&self.http.login_path) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LOGIN_PATH {} must not require authentication",
                self.http.login_path
            )));
        }

        if self.environment == Environment::Prod && self.iap.audience.is_none() {
            tracing::warn!("IAP_AUDIENCE is not set; proxy assertions are accepted for any audience");
        }

        Ok(())
    }

    fn is_authenticated_path(&self, path: &str) -> bool {
        self.http
            .authenticated_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
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

/// Unset and empty values both mean "not configured".
fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
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
