/// Configuration management for the ToolHub backend
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub sessions: SessionConfig,
    pub email: Option<EmailConfig>,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    pub environment: Environment,
    /// Public base URL used in reset emails
    pub public_url: String,
}

/// Deployment environment. The reset flow only echoes debug tokens
/// outside of production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_max_age_days: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub window_secs: u64,
    pub auth_max: u32,
    pub export_max: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("TOOLHUB_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("TOOLHUB_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ApiError::Internal("Invalid port number".to_string()))?;
        let version = env::var("TOOLHUB_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let environment = match env::var("TOOLHUB_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let public_url = env::var("TOOLHUB_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let data_directory: PathBuf = env::var("TOOLHUB_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("TOOLHUB_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("toolhub.sqlite"));

        let cookie_name = env::var("TOOLHUB_SESSION_COOKIE").unwrap_or_else(|_| "sid".to_string());
        let cookie_max_age_days = env::var("TOOLHUB_SESSION_COOKIE_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let email = if let Ok(smtp_url) = env::var("TOOLHUB_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("TOOLHUB_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let rate_limit_enabled = env::var("TOOLHUB_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let window_secs = env::var("TOOLHUB_RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);
        let auth_max = env::var("TOOLHUB_RATE_LIMIT_AUTH_MAX")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);
        let export_max = env::var("TOOLHUB_RATE_LIMIT_EXPORT_MAX")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                environment,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            sessions: SessionConfig {
                cookie_name,
                cookie_max_age_days,
            },
            email,
            rate_limit: RateLimitSettings {
                enabled: rate_limit_enabled,
                window_secs,
                auth_max,
                export_max,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Internal("Hostname cannot be empty".to_string()));
        }

        if self.sessions.cookie_name.is_empty() {
            return Err(ApiError::Internal(
                "Session cookie name cannot be empty".to_string(),
            ));
        }

        if self.rate_limit.window_secs == 0 {
            return Err(ApiError::Internal(
                "Rate limit window must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
