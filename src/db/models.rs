/// Database row models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account record
///
/// `password_hash` is NULL for legacy accounts imported from the
/// pre-password era; those cannot authenticate until they go through
/// the reset flow.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub marketing_opt_in: bool,
    pub is_pro: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Session record. Durable across restarts; never expired server-side
/// (logout only clears the client cookie).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Password reset token. Valid iff `used_at IS NULL` and not expired.
/// Rows are never physically deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PasswordReset {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Per-account invoicing defaults, one-to-one with `users`
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub user_id: i64,
    pub legal_name: Option<String>,
    pub address: Option<String>,
    pub vat_number: Option<String>,
    pub fiscal_code: Option<String>,
    pub tax_regime: Option<String>,
    pub default_vat_rate: Option<f64>,
    pub default_currency: Option<String>,
    pub default_footer_note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Billing counterparty, many per account
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub vat_number: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persisted invoice; `payload` is the serialized document payload
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub user_id: i64,
    pub client_id: i64,
    pub number: String,
    pub payload: String,
    pub total: f64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Named, immutable quote payload blob
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuoteTemplate {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}
