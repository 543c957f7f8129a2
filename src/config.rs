/// Configuration management for ICU Sentinel
use crate::error::{IcuError, IcuResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub otp: OtpConfig,
    pub uploads: UploadConfig,
    pub ai: AiConfig,
    pub email: Option<EmailConfig>,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL prefixed to artifact locators (e.g. http://localhost:5000)
    pub public_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    /// Root of the File Store; partitions live underneath
    pub upload_directory: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of staff/admin tokens in days
    pub staff_token_ttl_days: i64,
}

/// Which backend keeps OTP challenges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpBackend {
    Memory,
    Redis,
}

/// OTP challenge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    pub ttl_seconds: i64,
    pub backend: OtpBackend,
    /// Echo the code in the request-otp response. Development only.
    pub expose_debug_code: bool,
}

/// Upload size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub report_max_bytes: usize,
    pub chat_image_max_bytes: usize,
}

/// External AI collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub service_url: Option<String>,
    pub timeout_seconds: u64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Redis cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
    pub key_prefix: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub credential_rps: u32,
    pub general_rps: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> IcuResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("ICU_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("ICU_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| IcuError::Validation("Invalid port number".to_string()))?;
        let public_url =
            env::var("ICU_BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let data_directory: PathBuf = env::var("ICU_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("ICU_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("icu.sqlite"));
        let upload_directory = env::var("ICU_UPLOAD_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("uploads"));

        let jwt_secret = env::var("ICU_JWT_SECRET")
            .map_err(|_| IcuError::Validation("JWT secret required".to_string()))?;
        let staff_token_ttl_days = env::var("ICU_JWT_EXPIRE_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .unwrap_or(7);

        let otp_ttl = env::var("ICU_OTP_TTL_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);
        let otp_backend = match env::var("ICU_OTP_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => OtpBackend::Memory,
            "redis" => OtpBackend::Redis,
            other => {
                return Err(IcuError::Validation(format!(
                    "Unknown OTP backend: {}",
                    other
                )))
            }
        };
        let expose_debug_code = env::var("ICU_OTP_DEBUG_ECHO")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let report_max_bytes = env::var("ICU_REPORT_UPLOAD_LIMIT")
            .unwrap_or_else(|_| "10485760".to_string())
            .parse()
            .unwrap_or(10 * 1024 * 1024);
        let chat_image_max_bytes = env::var("ICU_CHAT_IMAGE_UPLOAD_LIMIT")
            .unwrap_or_else(|_| "5242880".to_string())
            .parse()
            .unwrap_or(5 * 1024 * 1024);

        let ai_service_url = env::var("ICU_AI_SERVICE_URL").ok().filter(|s| !s.is_empty());
        let ai_timeout = env::var("ICU_AI_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let email = if let Ok(smtp_url) = env::var("ICU_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("ICU_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let key_prefix = env::var("ICU_CACHE_KEY_PREFIX").unwrap_or_else(|_| "icu:".to_string());

        let rate_limit_enabled = env::var("ICU_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let credential_rps = env::var("ICU_RATE_LIMIT_CREDENTIAL_RPS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let general_rps = env::var("ICU_RATE_LIMIT_GENERAL_RPS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);
        let burst_size = env::var("ICU_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "icu_sentinel=debug,tower_http=debug".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
                upload_directory,
            },
            authentication: AuthConfig {
                jwt_secret,
                staff_token_ttl_days,
            },
            otp: OtpConfig {
                ttl_seconds: otp_ttl,
                backend: otp_backend,
                expose_debug_code,
            },
            uploads: UploadConfig {
                report_max_bytes,
                chat_image_max_bytes,
            },
            ai: AiConfig {
                service_url: ai_service_url,
                timeout_seconds: ai_timeout,
            },
            email,
            cache: CacheConfig {
                redis_url,
                key_prefix,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                credential_rps,
                general_rps,
                burst_size,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> IcuResult<()> {
        if self.service.hostname.is_empty() {
            return Err(IcuError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(IcuError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.otp.ttl_seconds <= 0 {
            return Err(IcuError::Validation(
                "OTP TTL must be positive".to_string(),
            ));
        }

        if self.otp.expose_debug_code {
            tracing::warn!("ICU_OTP_DEBUG_ECHO is on: OTP codes are returned to clients");
        }

        Ok(())
    }

    /// Configuration used by unit tests
    #[cfg(test)]
    pub fn for_tests(data_directory: PathBuf) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 5000,
                public_url: "http://localhost:5000".to_string(),
            },
            storage: StorageConfig {
                database: data_directory.join("icu.sqlite"),
                upload_directory: data_directory.join("uploads"),
                data_directory,
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                staff_token_ttl_days: 7,
            },
            otp: OtpConfig {
                ttl_seconds: 300,
                backend: OtpBackend::Memory,
                expose_debug_code: true,
            },
            uploads: UploadConfig {
                report_max_bytes: 1024 * 1024,
                chat_image_max_bytes: 5 * 1024 * 1024,
            },
            ai: AiConfig {
                service_url: None,
                timeout_seconds: 1,
            },
            email: None,
            cache: CacheConfig {
                redis_url: "redis://localhost:6379".to_string(),
                key_prefix: "icu-test:".to_string(),
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                credential_rps: 5,
                general_rps: 100,
                burst_size: 20,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
            },
        }
    }
}
