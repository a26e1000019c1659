/// Application context and dependency injection
use crate::{
    account::AccountManager,
    ai::{AiGateway, ChatBackend, OpenAiCompatibleBackend},
    checkin::CheckinManager,
    config::ServerConfig,
    db,
    error::{AppError, AppResult},
    pairing::PairingManager,
    rate_limit::RateLimiter,
    reports::ReportOrchestrator,
    tree::TreeManager,
    uploads::UploadStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub pairing_manager: PairingManager,
    pub checkin_manager: Arc<CheckinManager>,
    pub report_orchestrator: ReportOrchestrator,
    pub tree_manager: TreeManager,
    pub ai: AiGateway,
    pub uploads: Arc<UploadStore>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context talking to the configured AI endpoint
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        let backend = Arc::new(OpenAiCompatibleBackend::new(&config.ai)?);
        Self::with_chat_backend(config, backend).await
    }

    /// Create a context around an explicit chat backend
    pub async fn with_chat_backend(
        config: ServerConfig,
        backend: Arc<dyn ChatBackend>,
    ) -> AppResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let config = Arc::new(config);

        let ai = AiGateway::new(
            backend,
            config.ai.text_model.clone(),
            config.ai.multimodal_model.clone(),
            config.uploads.directory.clone(),
        );

        let account_manager = Arc::new(AccountManager::new(db.clone(), Arc::clone(&config)));
        let pairing_manager = PairingManager::new(db.clone());
        let tree_manager = TreeManager::new(db.clone());
        let report_orchestrator = ReportOrchestrator::new(db.clone(), ai.clone());
        let checkin_manager = Arc::new(CheckinManager::new(
            db.clone(),
            pairing_manager.clone(),
            tree_manager.clone(),
            report_orchestrator.clone(),
            ai.clone(),
        ));

        let uploads = Arc::new(UploadStore::new(
            config.uploads.directory.clone(),
            config.uploads.max_file_size,
        ));
        uploads.ensure_directories().await?;

        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Ok(Self {
            config,
            db,
            account_manager,
            pairing_manager,
            checkin_manager,
            report_orchestrator,
            tree_manager,
            ai,
            uploads,
            rate_limiter,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> AppResult<()> {
        let dirs = [&config.storage.data_directory, &config.uploads.directory];

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    AppError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
