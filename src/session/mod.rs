/// Session management
///
/// Durable cookie-carried sessions plus the migration bridge that
/// upgrades deprecated bearer tokens into modern sessions.

use crate::{
    db::models::SessionRecord,
    error::{ApiError, ApiResult},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A credential carried by an incoming request
#[derive(Debug, Clone)]
pub enum Credential {
    /// Modern HTTP-only cookie session id
    CookieSession(String),
    /// Deprecated bearer token from the pre-cookie era
    LegacyToken(String),
}

/// Result of resolving a credential. `minted` is set when a legacy
/// token was upgraded; the caller must hand the new session id back to
/// the client as a cookie.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub user_id: i64,
    pub session_id: String,
    pub minted: Option<SessionRecord>,
}

/// Injected store backing the legacy token -> account table.
///
/// `take` removes the entry, which is what enforces the at-most-once
/// upgrade per token per process lifetime.
#[async_trait]
pub trait LegacyTokenStore: Send + Sync {
    async fn insert(&self, token: String, user_id: i64);
    async fn take(&self, token: &str) -> Option<i64>;
}

/// Process-local, unbounded map. Entries are only removed on upgrade;
/// there is no TTL or size cap. TODO: retire together with the legacy
/// header once the migration window closes.
#[derive(Default)]
pub struct InMemoryLegacyTokens {
    map: Mutex<HashMap<String, i64>>,
}

impl InMemoryLegacyTokens {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LegacyTokenStore for InMemoryLegacyTokens {
    async fn insert(&self, token: String, user_id: i64) {
        self.map.lock().expect("legacy token map poisoned").insert(token, user_id);
    }

    async fn take(&self, token: &str) -> Option<i64> {
        self.map.lock().expect("legacy token map poisoned").remove(token)
    }
}

/// Session manager service
pub struct SessionManager {
    db: SqlitePool,
    legacy: Arc<dyn LegacyTokenStore>,
}

impl SessionManager {
    pub fn new(db: SqlitePool, legacy: Arc<dyn LegacyTokenStore>) -> Self {
        Self { db, legacy }
    }

    /// Create a durable session for an account
    pub async fn create(&self, user_id: i64) -> ApiResult<SessionRecord> {
        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            last_seen: now,
        };

        sqlx::query(
            "INSERT INTO sessions (id, user_id, created_at, last_seen) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&record.id)
        .bind(record.user_id)
        .bind(record.created_at)
        .bind(record.last_seen)
        .execute(&self.db)
        .await?;

        Ok(record)
    }

    /// Resolve a credential to an account.
    ///
    /// Cookie sessions resolve directly and are touched. A legacy token
    /// is upgraded: taken out of the injected store and replaced with a
    /// freshly minted cookie session returned in `minted`.
    pub async fn resolve(&self, credential: Credential) -> ApiResult<ResolvedSession> {
        match credential {
            Credential::CookieSession(id) => {
                let user_id = self.lookup(&id).await?.ok_or(ApiError::Unauthenticated)?;
                self.touch(&id).await;
                Ok(ResolvedSession {
                    user_id,
                    session_id: id,
                    minted: None,
                })
            }
            Credential::LegacyToken(token) => {
                let user_id = self
                    .legacy
                    .take(&token)
                    .await
                    .ok_or(ApiError::Unauthenticated)?;
                let minted = self.create(user_id).await?;
                tracing::info!("upgraded legacy token to session for user {}", user_id);
                Ok(ResolvedSession {
                    user_id,
                    session_id: minted.id.clone(),
                    minted: Some(minted),
                })
            }
        }
    }

    /// Update `last_seen`. Best-effort: failures are logged and swallowed.
    pub async fn touch(&self, session_id: &str) {
        let result = sqlx::query("UPDATE sessions SET last_seen = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(session_id)
            .execute(&self.db)
            .await;
        if let Err(e) = result {
            tracing::debug!("failed to touch session {}: {}", session_id, e);
        }
    }

    /// Drop the server-side session record (used by tests and tooling;
    /// logout itself only clears the client cookie)
    pub async fn destroy(&self, session_id: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn lookup(&self, session_id: &str) -> ApiResult<Option<i64>> {
        let row = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, created_at, last_seen FROM sessions WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|r| r.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Row;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    async fn seed_user(pool: &SqlitePool) -> i64 {
        sqlx::query("INSERT INTO users (email, created_at) VALUES ('mario@example.com', ?1)")
            .bind(Utc::now())
            .execute(pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    async fn session_count(pool: &SqlitePool) -> i64 {
        sqlx::query("SELECT COUNT(*) AS c FROM sessions")
            .fetch_one(pool)
            .await
            .unwrap()
            .get("c")
    }

    #[tokio::test]
    async fn cookie_resolution_is_idempotent() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;
        let manager = SessionManager::new(pool.clone(), Arc::new(InMemoryLegacyTokens::new()));

        let session = manager.create(user_id).await.unwrap();

        let first = manager
            .resolve(Credential::CookieSession(session.id.clone()))
            .await
            .unwrap();
        let second = manager
            .resolve(Credential::CookieSession(session.id.clone()))
            .await
            .unwrap();

        assert_eq!(first.user_id, user_id);
        assert_eq!(second.user_id, user_id);
        assert!(first.minted.is_none());
        // Resolution must not create extra session rows
        assert_eq!(session_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn unknown_cookie_is_unauthenticated() {
        let pool = test_pool().await;
        let manager = SessionManager::new(pool, Arc::new(InMemoryLegacyTokens::new()));

        let err = manager
            .resolve(Credential::CookieSession("nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
    }

    #[tokio::test]
    async fn legacy_token_upgrades_exactly_once() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;
        let legacy = Arc::new(InMemoryLegacyTokens::new());
        legacy.insert("old-token".into(), user_id).await;
        let manager = SessionManager::new(pool.clone(), legacy);

        let resolved = manager
            .resolve(Credential::LegacyToken("old-token".into()))
            .await
            .unwrap();
        assert_eq!(resolved.user_id, user_id);
        let minted = resolved.minted.expect("upgrade mints a session");

        // The minted session is durable and keeps resolving
        let again = manager
            .resolve(Credential::CookieSession(minted.id.clone()))
            .await
            .unwrap();
        assert_eq!(again.user_id, user_id);

        // The legacy token was consumed by the upgrade
        let err = manager
            .resolve(Credential::LegacyToken("old-token".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        assert_eq!(session_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn destroy_removes_the_record() {
        let pool = test_pool().await;
        let user_id = seed_user(&pool).await;
        let manager = SessionManager::new(pool.clone(), Arc::new(InMemoryLegacyTokens::new()));

        let session = manager.create(user_id).await.unwrap();
        manager.destroy(&session.id).await.unwrap();

        let err = manager
            .resolve(Credential::CookieSession(session.id))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
    }
}
