/// Configuration management for the Qinjian backend
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub ai: AiConfig,
    pub uploads: UploadConfig,
    pub rate_limit: RateLimitSettings,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in minutes
    pub token_ttl_minutes: i64,
}

/// OpenAI-compatible chat-completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Model used for sentiment scoring and daily/solo reports
    pub text_model: String,
    /// Model used for image analysis and weekly/monthly reports
    pub multimodal_model: String,
    pub timeout_secs: u64,
}

/// File upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub directory: PathBuf,
    pub max_file_size: usize,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Pending reports older than this are marked failed
    pub stale_report_minutes: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env_or("QINJIAN_HOSTNAME", "0.0.0.0");
        let port = env_or("QINJIAN_PORT", "8000")
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let version = env_or("QINJIAN_VERSION", env!("CARGO_PKG_VERSION"));

        let data_directory: PathBuf = env_or("QINJIAN_DATA_DIRECTORY", "./data").into();
        let database = env::var("QINJIAN_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("qinjian.sqlite"));

        let jwt_secret = env::var("QINJIAN_JWT_SECRET")
            .map_err(|_| AppError::Validation("JWT secret required".to_string()))?;
        let token_ttl_minutes = env_parse("QINJIAN_TOKEN_TTL_MINUTES", 60 * 24 * 7);

        let ai = AiConfig {
            base_url: env_or("QINJIAN_AI_BASE_URL", "https://api.siliconflow.cn/v1"),
            api_key: env_or("QINJIAN_AI_API_KEY", ""),
            text_model: env_or("QINJIAN_AI_TEXT_MODEL", "deepseek-ai/DeepSeek-V3"),
            multimodal_model: env_or("QINJIAN_AI_MULTIMODAL_MODEL", "moonshot/kimi-k2.5"),
            timeout_secs: env_parse("QINJIAN_AI_TIMEOUT_SECS", 60),
        };

        let uploads = UploadConfig {
            directory: env_or("QINJIAN_UPLOAD_DIR", "./uploads").into(),
            max_file_size: env_parse("QINJIAN_MAX_UPLOAD_SIZE", 10 * 1024 * 1024),
        };

        let rate_limit = RateLimitSettings {
            enabled: env_parse("QINJIAN_RATE_LIMITS_ENABLED", true),
            authenticated_rps: env_parse("QINJIAN_RATE_LIMIT_AUTHENTICATED_RPS", 50),
            unauthenticated_rps: env_parse("QINJIAN_RATE_LIMIT_UNAUTHENTICATED_RPS", 10),
        };

        let jobs = JobsConfig {
            stale_report_minutes: env_parse("QINJIAN_STALE_REPORT_MINUTES", 30),
        };

        let logging = LoggingConfig {
            level: env_or("RUST_LOG", "info"),
            json: env_or("QINJIAN_LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                jwt_secret,
                token_ttl_minutes,
            },
            ai,
            uploads,
            rate_limit,
            jobs,
            logging,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(AppError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.token_ttl_minutes <= 0 {
            return Err(AppError::Validation(
                "Token lifetime must be positive".to_string(),
            ));
        }

        if self.uploads.max_file_size == 0 {
            return Err(AppError::Validation(
                "Upload size limit must be positive".to_string(),
            ));
        }

        if self.ai.api_key.is_empty() {
            tracing::warn!("QINJIAN_AI_API_KEY is not set; AI calls will fail and reports will be marked failed");
        }

        Ok(())
    }

    /// Configuration rooted in a scratch directory, used by tests
    pub fn for_directory(root: &std::path::Path) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig {
                data_directory: root.join("data"),
                database: root.join("data").join("qinjian.sqlite"),
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
                token_ttl_minutes: 60,
            },
            ai: AiConfig {
                base_url: "http://127.0.0.1:9/v1".to_string(),
                api_key: "test-key".to_string(),
                text_model: "text-model".to_string(),
                multimodal_model: "vision-model".to_string(),
                timeout_secs: 5,
            },
            uploads: UploadConfig {
                directory: root.join("uploads"),
                max_file_size: 1024 * 1024,
            },
            rate_limit: RateLimitSettings {
                enabled: false,
                authenticated_rps: 50,
                unauthenticated_rps: 10,
            },
            jobs: JobsConfig {
                stale_report_minutes: 30,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_short_secret() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_directory(dir.path());
        assert!(config.validate().is_ok());

        config.authentication.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_hostname() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_directory(dir.path());
        config.service.hostname.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::for_directory(dir.path());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("test-key"));
    }
}
