/// Saved quote template endpoints: immutable named payload blobs
use crate::{
    auth::CurrentUser,
    context::AppContext,
    db::models::QuoteTemplate,
    error::{ApiError, ApiResult, ValidationError},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/templates/quote", get(list_templates).post(save_template))
        .route(
            "/api/templates/quote/:id",
            get(get_template).delete(delete_template),
        )
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SaveTemplateRequest {
    name: Option<String>,
    payload: Option<serde_json::Value>,
}

async fn save_template(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Json(req): Json<SaveTemplateRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let (Some(name), Some(payload)) = (
        req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()),
        req.payload.as_ref(),
    ) else {
        return Err(ValidationError::MissingFields.into());
    };

    let result = sqlx::query(
        "INSERT INTO quote_templates (user_id, name, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(user.user_id)
    .bind(name)
    .bind(payload.to_string())
    .bind(Utc::now())
    .execute(&ctx.db)
    .await?;

    Ok(Json(json!({ "ok": true, "id": result.last_insert_rowid() })))
}

async fn list_templates(
    State(ctx): State<AppContext>,
    user: CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    let rows = sqlx::query_as::<_, QuoteTemplate>(
        "SELECT id, user_id, name, payload, created_at
         FROM quote_templates WHERE user_id = ?1 ORDER BY created_at DESC",
    )
    .bind(user.user_id)
    .fetch_all(&ctx.db)
    .await?;

    let items: Vec<serde_json::Value> = rows
        .iter()
        .map(|t| json!({ "id": t.id, "name": t.name, "created_at": t.created_at }))
        .collect();

    Ok(Json(json!({ "ok": true, "items": items })))
}

async fn get_template(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let template = sqlx::query_as::<_, QuoteTemplate>(
        "SELECT id, user_id, name, payload, created_at
         FROM quote_templates WHERE id = ?1 AND user_id = ?2",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&ctx.db)
    .await?
    .ok_or(ApiError::NotFound)?;

    // Stored blobs predating payload validation may not parse; surface
    // them as raw strings rather than failing the read
    let payload: serde_json::Value = serde_json::from_str(&template.payload)
        .unwrap_or(serde_json::Value::String(template.payload.clone()));

    Ok(Json(json!({
        "ok": true,
        "item": {
            "id": template.id,
            "name": template.name,
            "payload": payload,
            "created_at": template.created_at,
        }
    })))
}

async fn delete_template(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM quote_templates WHERE id = ?1 AND user_id = ?2")
        .bind(id)
        .bind(user.user_id)
        .execute(&ctx.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
