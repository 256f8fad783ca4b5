/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db,
    error::ApiResult,
    mailer::Mailer,
    rate_limit::{RateLimitConfig, RateLimiter},
    session::{InMemoryLegacyTokens, LegacyTokenStore, SessionManager},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub sessions: Arc<SessionManager>,
    /// Concrete handle kept for seeding tokens from migration tooling
    pub legacy_tokens: Arc<InMemoryLegacyTokens>,
    pub rate_limiter: Arc<RateLimiter>,
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let accounts = Arc::new(AccountManager::new(db.clone()));

        let legacy_tokens = Arc::new(InMemoryLegacyTokens::new());
        let legacy_store: Arc<dyn LegacyTokenStore> = legacy_tokens.clone();
        let sessions = Arc::new(SessionManager::new(db.clone(), legacy_store));

        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            enabled: config.rate_limit.enabled,
            window: Duration::from_secs(config.rate_limit.window_secs),
            auth_max: config.rate_limit.auth_max,
            export_max: config.rate_limit.export_max,
        }));

        let mailer = Arc::new(Mailer::new(config.email.clone())?);

        Ok(Self {
            config: Arc::new(config),
            db,
            accounts,
            sessions,
            legacy_tokens,
            rate_limiter,
            mailer,
        })
    }

    /// Public base URL for links in outbound email
    pub fn public_url(&self) -> &str {
        &self.config.service.public_url
    }
}
