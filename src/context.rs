/// Application context and dependency injection
use crate::{
    account::AccountManager,
    ai::{AiProcessor, HttpAiProcessor},
    cache::CacheClient,
    config::{OtpBackend, ServerConfig},
    db,
    error::{IcuError, IcuResult},
    file_store::{DiskFileBackend, FileStore, UploadConstraints},
    mailer::Mailer,
    otp::{MemoryOtpStore, OtpService, OtpStore, RedisOtpStore},
    patient::PatientManager,
    rate_limit::RateLimiter,
    report::ReportManager,
    token::TokenService,
    vital::VitalManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// URL path of the report partition
pub const REPORT_UPLOAD_PATH: &str = "uploads";
/// URL path of the chat image partition
pub const CHAT_IMAGE_PATH: &str = "uploads/chat-images";

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub token_service: TokenService,
    pub account_manager: Arc<AccountManager>,
    pub patient_manager: Arc<PatientManager>,
    pub otp_service: Arc<OtpService>,
    pub report_manager: Arc<ReportManager>,
    pub vital_manager: Arc<VitalManager>,
    // Chat images are stored but never tracked by a report
    pub chat_images: FileStore,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> IcuResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::open(&config.storage.database).await?;

        let otp_store: Arc<dyn OtpStore> = match config.otp.backend {
            OtpBackend::Memory => {
                tracing::warn!(
                    "OTP challenges are kept in process memory; they are lost on restart and not shared between instances"
                );
                Arc::new(MemoryOtpStore::new())
            }
            OtpBackend::Redis => {
                let cache = CacheClient::new(&config.cache).await?;
                Arc::new(RedisOtpStore::new(cache))
            }
        };

        Self::from_parts(config, db, otp_store)
    }

    /// Wire services over an open database
    fn from_parts(
        config: ServerConfig,
        db: SqlitePool,
        otp_store: Arc<dyn OtpStore>,
    ) -> IcuResult<Self> {
        let token_service = TokenService::new(
            &config.authentication.jwt_secret,
            config.authentication.staff_token_ttl_days,
        );

        let account_manager = Arc::new(AccountManager::new(db.clone(), token_service.clone()));
        let patient_manager = Arc::new(PatientManager::new(db.clone()));

        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        if !mailer.is_configured() {
            tracing::info!("Email not configured, OTP codes will be written to the log");
        }

        let otp_service = Arc::new(OtpService::new(
            otp_store,
            patient_manager.clone(),
            token_service.clone(),
            mailer,
            config.otp.ttl_seconds,
        ));

        let report_files = FileStore::new(
            Arc::new(DiskFileBackend::new(config.storage.upload_directory.clone())),
            &config.service.public_url,
            REPORT_UPLOAD_PATH,
        );
        let chat_images = FileStore::new(
            Arc::new(DiskFileBackend::new(
                config.storage.upload_directory.join("chat-images"),
            )),
            &config.service.public_url,
            CHAT_IMAGE_PATH,
        );

        let ai: Option<Arc<dyn AiProcessor>> = match &config.ai.service_url {
            Some(url) => {
                tracing::info!("AI processing enabled at {}", url);
                Some(Arc::new(HttpAiProcessor::new(url, config.ai.timeout_seconds)?))
            }
            None => None,
        };

        let report_manager = Arc::new(ReportManager::new(
            db.clone(),
            patient_manager.clone(),
            report_files,
            UploadConstraints::reports(config.uploads.report_max_bytes),
            ai,
        ));

        let vital_manager = Arc::new(VitalManager::new(db, patient_manager.clone()));

        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            token_service,
            account_manager,
            patient_manager,
            otp_service,
            report_manager,
            vital_manager,
            chat_images,
            rate_limiter,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> IcuResult<()> {
        let dirs = [
            config.storage.data_directory.clone(),
            config.storage.upload_directory.clone(),
            config.storage.upload_directory.join("chat-images"),
        ];

        for dir in dirs {
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                IcuError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Context over an in-memory database with uploads under `data_directory`
    #[cfg(test)]
    pub async fn for_tests(data_directory: &std::path::Path) -> Self {
        let config = ServerConfig::for_tests(data_directory.to_path_buf());
        let db = db::test_pool().await;
        Self::from_parts(config, db, Arc::new(MemoryOtpStore::new())).unwrap()
    }
}
