/// Business profile endpoints
use crate::{
    auth::CurrentUser,
    context::AppContext,
    db::models::BusinessProfile,
    error::ApiResult,
};
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/profile", get(get_profile).put(put_profile))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub legal_name: Option<String>,
    pub address: Option<String>,
    pub vat_number: Option<String>,
    pub fiscal_code: Option<String>,
    pub tax_regime: Option<String>,
    pub default_vat_rate: Option<f64>,
    pub default_currency: Option<String>,
    pub default_footer_note: Option<String>,
}

pub(crate) async fn load_profile(
    db: &SqlitePool,
    user_id: i64,
) -> ApiResult<Option<BusinessProfile>> {
    let profile = sqlx::query_as::<_, BusinessProfile>(
        "SELECT user_id, legal_name, address, vat_number, fiscal_code, tax_regime,
                default_vat_rate, default_currency, default_footer_note, updated_at
         FROM business_profiles WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(profile)
}

/// Upsert as one atomic conditional statement. Concurrent PUTs for the
/// same account then serialize in the storage layer instead of racing
/// a read-then-write sequence into a lost update.
pub(crate) async fn upsert_profile(
    db: &SqlitePool,
    user_id: i64,
    req: &UpdateProfileRequest,
) -> ApiResult<()> {
    sqlx::query(
        "INSERT INTO business_profiles
            (user_id, legal_name, address, vat_number, fiscal_code, tax_regime,
             default_vat_rate, default_currency, default_footer_note, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(user_id) DO UPDATE SET
            legal_name = excluded.legal_name,
            address = excluded.address,
            vat_number = excluded.vat_number,
            fiscal_code = excluded.fiscal_code,
            tax_regime = excluded.tax_regime,
            default_vat_rate = excluded.default_vat_rate,
            default_currency = excluded.default_currency,
            default_footer_note = excluded.default_footer_note,
            updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(&req.legal_name)
    .bind(&req.address)
    .bind(&req.vat_number)
    .bind(&req.fiscal_code)
    .bind(&req.tax_regime)
    .bind(req.default_vat_rate)
    .bind(&req.default_currency)
    .bind(&req.default_footer_note)
    .bind(Utc::now())
    .execute(db)
    .await?;
    Ok(())
}

async fn get_profile(
    State(ctx): State<AppContext>,
    user: CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    let profile = load_profile(&ctx.db, user.user_id).await?;
    Ok(Json(json!({ "ok": true, "profile": profile })))
}

async fn put_profile(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    upsert_profile(&ctx.db, user.user_id, &req).await?;
    let profile = load_profile(&ctx.db, user.user_id).await?;
    Ok(Json(json!({ "ok": true, "profile": profile })))
}
