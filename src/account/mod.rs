/// Account management
///
/// Credential storage, password verification and the password reset
/// lifecycle. Session issuance lives in the session module; handlers
/// compose the two.

mod manager;

pub use manager::{AccountManager, ResetIssue};

use crate::db::models::Account;
use serde::{Deserialize, Serialize};

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub marketing_opt_in: bool,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Password reset request (step 1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestResetRequest {
    pub email: Option<String>,
}

/// Password reset confirmation (step 2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmResetRequest {
    pub token: Option<String>,
    pub password: Option<String>,
}

/// Password change for an authenticated session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Account summary exposed over the wire (never the hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub email: String,
    pub name: Option<String>,
    pub is_pro: bool,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            email: account.email.clone(),
            name: account.name.clone(),
            is_pro: account.is_pro,
        }
    }
}

/// Login/register response carrying the freshly minted session id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub ok: bool,
    pub account: AccountSummary,
    pub session_id: String,
}
