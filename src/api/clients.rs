/// Client (billing counterparty) endpoints
use crate::{
    auth::CurrentUser,
    context::AppContext,
    db::models::ClientRecord,
    error::{ApiError, ApiResult, ValidationError},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/clients", get(list_clients).post(create_client))
        .route("/api/clients/:id", delete(delete_client))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CreateClientRequest {
    name: Option<String>,
    vat_number: Option<String>,
    address: Option<String>,
    notes: Option<String>,
}

async fn list_clients(
    State(ctx): State<AppContext>,
    user: CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    let items = sqlx::query_as::<_, ClientRecord>(
        "SELECT id, user_id, name, vat_number, address, notes, created_at
         FROM clients WHERE user_id = ?1 ORDER BY created_at DESC",
    )
    .bind(user.user_id)
    .fetch_all(&ctx.db)
    .await?;
    Ok(Json(json!({ "ok": true, "items": items })))
}

async fn create_client(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Json(req): Json<CreateClientRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ValidationError::MissingFields)?;

    let result = sqlx::query(
        "INSERT INTO clients (user_id, name, vat_number, address, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(user.user_id)
    .bind(name)
    .bind(&req.vat_number)
    .bind(&req.address)
    .bind(&req.notes)
    .bind(Utc::now())
    .execute(&ctx.db)
    .await?;

    Ok(Json(json!({ "ok": true, "id": result.last_insert_rowid() })))
}

async fn delete_client(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM clients WHERE id = ?1 AND user_id = ?2")
        .bind(id)
        .bind(user.user_id)
        .execute(&ctx.db)
        .await?;

    if result.rows_affected() == 0 {
        // Wrong owner looks identical to a missing row
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
