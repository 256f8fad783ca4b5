/// Account manager implementation using runtime queries
use crate::{
    db::models::Account,
    error::{ApiError, ApiResult, ValidationError},
    validation::{normalize_email, validate_email, validate_password},
};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::{Row, SqlitePool};

/// Reset tokens expire 30 minutes after issuance
const RESET_TOKEN_TTL_MINUTES: i64 = 30;

/// Outcome of a reset request for an existing account: the caller
/// dispatches the token (mail, or a debug echo outside production).
#[derive(Debug, Clone)]
pub struct ResetIssue {
    pub token: String,
    pub email: String,
    pub name: Option<String>,
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a new account. Does not create a session; that is the
    /// caller's job via the session manager.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
        marketing_opt_in: bool,
    ) -> ApiResult<Account> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        let existing = sqlx::query("SELECT id FROM users WHERE email = ?1")
            .bind(&email)
            .fetch_optional(&self.db)
            .await?;
        if existing.is_some() {
            return Err(ValidationError::EmailExists.into());
        }

        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, name, marketing_opt_in, is_pro, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(&name)
        .bind(marketing_opt_in)
        .bind(false)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match &e {
            // The UNIQUE index is the authority; the pre-check above only
            // gives a friendlier common path.
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Validation(ValidationError::EmailExists)
            }
            _ => ApiError::Database(e),
        })?;

        tracing::info!("registered account {}", email);

        Ok(Account {
            id: result.last_insert_rowid(),
            email,
            password_hash: Some(password_hash),
            name,
            marketing_opt_in,
            is_pro: false,
            created_at: now,
            last_login: None,
        })
    }

    /// Verify credentials and stamp `last_login`
    pub async fn verify(&self, email: &str, password: &str) -> ApiResult<Account> {
        let email = normalize_email(email);
        let mut account = self
            .get_by_email(&email)
            .await?
            .ok_or(ValidationError::InvalidCredentials)?;

        let hash = account
            .password_hash
            .as_deref()
            .ok_or(ValidationError::LegacyAccount)?;

        let valid = bcrypt::verify(password, hash)
            .map_err(|e| ApiError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            crate::metrics::AUTH_FAILURES_TOTAL.inc();
            return Err(ValidationError::InvalidCredentials.into());
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login = ?1 WHERE id = ?2")
            .bind(now)
            .bind(account.id)
            .execute(&self.db)
            .await?;
        account.last_login = Some(now);

        Ok(account)
    }

    /// Change password for an authenticated account, re-verifying the
    /// current one first
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> ApiResult<()> {
        let account = self.get(user_id).await?;

        let hash = account
            .password_hash
            .as_deref()
            .ok_or(ValidationError::InvalidCredentials)?;
        let valid = bcrypt::verify(current_password, hash)
            .map_err(|e| ApiError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            return Err(ValidationError::InvalidCredentials.into());
        }

        validate_password(new_password)?;
        let new_hash = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

        sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
            .bind(&new_hash)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Mint a reset token for the account behind `email`, if any.
    ///
    /// Returns `Ok(None)` for unknown addresses so the handler can reply
    /// 200 either way and not leak which emails are registered.
    pub async fn request_reset(&self, email: &str) -> ApiResult<Option<ResetIssue>> {
        let email = normalize_email(email);
        let Some(account) = self.get_by_email(&email).await? else {
            tracing::debug!("reset requested for unknown email");
            return Ok(None);
        };

        let mut bytes = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let now = Utc::now();
        let expires_at = now + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        sqlx::query(
            "INSERT INTO password_resets (user_id, token, expires_at) VALUES (?1, ?2, ?3)",
        )
        .bind(account.id)
        .bind(&token)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(Some(ResetIssue {
            token,
            email: account.email,
            name: account.name,
        }))
    }

    /// Consume a reset token and set the new password.
    ///
    /// The token is claimed with a conditional UPDATE keyed on
    /// `used_at IS NULL`, so two concurrent confirms cannot both succeed.
    pub async fn confirm_reset(&self, token: &str, new_password: &str) -> ApiResult<()> {
        let row = sqlx::query(
            "SELECT id, user_id, expires_at, used_at FROM password_resets WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ValidationError::InvalidToken)?;

        let reset_id: i64 = row.try_get("id")?;
        let user_id: i64 = row.try_get("user_id")?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
        let used_at: Option<DateTime<Utc>> = row.try_get("used_at")?;

        if used_at.is_some() {
            return Err(ValidationError::TokenUsed.into());
        }
        let now = Utc::now();
        if now >= expires_at {
            return Err(ValidationError::TokenExpired.into());
        }

        validate_password(new_password)?;
        let new_hash = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

        // Claim the token first; losing this race means someone else
        // already consumed it.
        let claimed = sqlx::query(
            "UPDATE password_resets SET used_at = ?1 WHERE id = ?2 AND used_at IS NULL",
        )
        .bind(now)
        .bind(reset_id)
        .execute(&self.db)
        .await?;
        if claimed.rows_affected() == 0 {
            return Err(ValidationError::TokenUsed.into());
        }

        sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
            .bind(&new_hash)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        tracing::info!("password reset completed for user {}", user_id);

        Ok(())
    }

    /// Fetch an account by id
    pub async fn get(&self, user_id: i64) -> ApiResult<Account> {
        sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, name, marketing_opt_in, is_pro, created_at, last_login
             FROM users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound)
    }

    /// Flip the account to the Pro plan. No downgrade path.
    pub async fn set_pro(&self, user_id: i64) -> ApiResult<()> {
        sqlx::query("UPDATE users SET is_pro = 1 WHERE id = ?1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn get_by_email(&self, email: &str) -> ApiResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, name, marketing_opt_in, is_pro, created_at, last_login
             FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        // One connection: each in-memory SQLite connection is its own DB
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn register_then_verify_round_trip() {
        let manager = AccountManager::new(test_pool().await);

        let account = manager
            .register("Mario@Example.com", "secret99", Some("Mario".into()), false)
            .await
            .unwrap();
        assert_eq!(account.email, "mario@example.com");
        assert!(!account.is_pro);

        let verified = manager.verify("mario@example.com", "secret99").await.unwrap();
        assert_eq!(verified.id, account.id);
        assert!(verified.last_login.is_some());

        let err = manager
            .register("mario@example.com", "secret99", None, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::EmailExists)
        ));
    }

    #[tokio::test]
    async fn register_rejects_weak_passwords() {
        let manager = AccountManager::new(test_pool().await);

        for weak in ["short1", "nodigitshere", "12345678"] {
            let err = manager
                .register("weak@example.com", weak, None, false)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ApiError::Validation(ValidationError::WeakPassword)
            ));
        }
    }

    #[tokio::test]
    async fn register_rejects_bad_emails() {
        let manager = AccountManager::new(test_pool().await);

        let err = manager
            .register("not-an-email", "secret99", None, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidEmail)
        ));
    }

    #[tokio::test]
    async fn wrong_password_fails() {
        let manager = AccountManager::new(test_pool().await);
        manager
            .register("mario@example.com", "secret99", None, false)
            .await
            .unwrap();

        let err = manager.verify("mario@example.com", "wrong999").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn legacy_account_cannot_password_login() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO users (email, created_at) VALUES ('old@example.com', ?1)")
            .bind(Utc::now())
            .execute(&pool)
            .await
            .unwrap();
        let manager = AccountManager::new(pool);

        let err = manager.verify("old@example.com", "whatever1").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::LegacyAccount)
        ));
    }

    #[tokio::test]
    async fn reset_round_trip_and_single_use() {
        let manager = AccountManager::new(test_pool().await);
        manager
            .register("mario@example.com", "secret99", None, false)
            .await
            .unwrap();

        let issue = manager
            .request_reset("mario@example.com")
            .await
            .unwrap()
            .expect("token for existing account");
        assert_eq!(issue.token.len(), 48);

        manager.confirm_reset(&issue.token, "newpass77").await.unwrap();
        manager.verify("mario@example.com", "newpass77").await.unwrap();

        let err = manager.verify("mario@example.com", "secret99").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidCredentials)
        ));

        // Second consumption of the same token must fail
        let err = manager.confirm_reset(&issue.token, "another88").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ValidationError::TokenUsed)));
    }

    #[tokio::test]
    async fn reset_for_unknown_email_is_silent() {
        let manager = AccountManager::new(test_pool().await);
        let issue = manager.request_reset("ghost@example.com").await.unwrap();
        assert!(issue.is_none());
    }

    #[tokio::test]
    async fn reset_token_expiry_boundary() {
        let pool = test_pool().await;
        let manager = AccountManager::new(pool.clone());
        manager
            .register("mario@example.com", "secret99", None, false)
            .await
            .unwrap();

        // Expired a millisecond ago
        let issue = manager.request_reset("mario@example.com").await.unwrap().unwrap();
        sqlx::query("UPDATE password_resets SET expires_at = ?1 WHERE token = ?2")
            .bind(Utc::now() - Duration::milliseconds(1))
            .bind(&issue.token)
            .execute(&pool)
            .await
            .unwrap();
        let err = manager.confirm_reset(&issue.token, "newpass77").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::TokenExpired)
        ));

        // Still inside the window
        let issue = manager.request_reset("mario@example.com").await.unwrap().unwrap();
        sqlx::query("UPDATE password_resets SET expires_at = ?1 WHERE token = ?2")
            .bind(Utc::now() + Duration::seconds(5))
            .bind(&issue.token)
            .execute(&pool)
            .await
            .unwrap();
        manager.confirm_reset(&issue.token, "newpass77").await.unwrap();
    }

    #[tokio::test]
    async fn reset_rejects_weak_password_without_burning_token() {
        let manager = AccountManager::new(test_pool().await);
        manager
            .register("mario@example.com", "secret99", None, false)
            .await
            .unwrap();

        let issue = manager.request_reset("mario@example.com").await.unwrap().unwrap();
        let err = manager.confirm_reset(&issue.token, "weak").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::WeakPassword)
        ));

        // The failed attempt must not have consumed the token
        manager.confirm_reset(&issue.token, "newpass77").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let manager = AccountManager::new(test_pool().await);
        let err = manager.confirm_reset("deadbeef", "newpass77").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn change_password_reverifies_current() {
        let manager = AccountManager::new(test_pool().await);
        let account = manager
            .register("mario@example.com", "secret99", None, false)
            .await
            .unwrap();

        let err = manager
            .change_password(account.id, "wrong999", "newpass77")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidCredentials)
        ));

        manager
            .change_password(account.id, "secret99", "newpass77")
            .await
            .unwrap();
        manager.verify("mario@example.com", "newpass77").await.unwrap();
    }
}
