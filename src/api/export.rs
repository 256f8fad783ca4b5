/// Document export endpoints
use crate::{
    api::{pdf_response, profile::load_profile},
    auth::CurrentUser,
    context::AppContext,
    error::{ApiError, ApiResult, ValidationError},
    render::{
        context::build_context, context::ClientInfo, document_number, render_document,
        DocumentKind, DocumentPayload, MAX_LINE_ITEMS,
    },
};
use axum::{extract::State, response::Response, routing::post, Json, Router};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

/// Base-plan quote downloads per day; Pro is unlimited
const QUOTE_DOWNLOADS_PER_DAY: i64 = 3;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/export/quote", post(export_quote))
}

/// Quote exports recorded for this account in the current UTC day
pub(crate) async fn quote_downloads_today(db: &SqlitePool, user_id: i64) -> ApiResult<i64> {
    let count = sqlx::query(
        "SELECT COUNT(*) AS c FROM downloads
         WHERE user_id = ?1 AND tool_key = 'quote' AND DATE(created_at) = DATE('now')",
    )
    .bind(user_id)
    .fetch_one(db)
    .await?
    .try_get("c")?;
    Ok(count)
}

async fn export_quote(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Json(payload): Json<DocumentPayload>,
) -> ApiResult<Response> {
    // Everything that can refuse the request happens before rendering:
    // once bytes stream the response cannot be retried.
    let account = ctx.accounts.get(user.user_id).await?;
    if !account.is_pro && quote_downloads_today(&ctx.db, user.user_id).await? >= QUOTE_DOWNLOADS_PER_DAY
    {
        return Err(ApiError::DailyLimitReached);
    }

    if payload.line_items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::TooManyItems.into());
    }

    let profile = load_profile(&ctx.db, user.user_id).await?;
    let client = payload.client.as_ref().map(|name| ClientInfo {
        name: name.clone(),
        address: payload.client_address.clone().unwrap_or_default(),
    });
    let template_ctx = build_context(profile.as_ref(), client);

    let number = document_number();
    let bytes = render_document(DocumentKind::Quote, &payload, &template_ctx, &number)?;

    sqlx::query("INSERT INTO downloads (user_id, tool_key, created_at) VALUES (?1, 'quote', ?2)")
        .bind(user.user_id)
        .bind(Utc::now())
        .execute(&ctx.db)
        .await?;

    Ok(pdf_response("quote.pdf", bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        sqlx::query("INSERT INTO users (email, created_at) VALUES ('mario@example.com', ?1)")
            .bind(Utc::now())
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn record_download(pool: &SqlitePool, at: chrono::DateTime<Utc>) {
        sqlx::query("INSERT INTO downloads (user_id, tool_key, created_at) VALUES (1, 'quote', ?1)")
            .bind(at)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn counts_only_todays_quote_downloads() {
        let pool = test_pool().await;

        record_download(&pool, Utc::now()).await;
        record_download(&pool, Utc::now()).await;
        // Two days ago: outside the daily bucket
        record_download(&pool, Utc::now() - Duration::days(2)).await;
        // A different tool does not count
        sqlx::query("INSERT INTO downloads (user_id, tool_key, created_at) VALUES (1, 'flashcards', ?1)")
            .bind(Utc::now())
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(quote_downloads_today(&pool, 1).await.unwrap(), 2);
        // Another account is unaffected
        assert_eq!(quote_downloads_today(&pool, 2).await.unwrap(), 0);
    }
}
