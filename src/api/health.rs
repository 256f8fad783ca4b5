/// Health and metrics endpoints
use crate::{context::AppContext, db, metrics};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
}

async fn health_check(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    let db_ok = db::test_connection(&ctx.db).await.is_ok();
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "version": ctx.config.service.version,
        "db": db_ok,
    }))
}

async fn metrics_handler() -> String {
    metrics::render_metrics()
}
