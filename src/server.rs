/// HTTP server setup and routing
use crate::{
    api, auth,
    context::AppContext,
    error::{ApiError, ApiResult},
    metrics, rate_limit,
};
use axum::{
    extract::Request,
    http::{header, HeaderName, Method, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
///
/// Middleware is layered per route group: the auth rate bucket guards
/// credential endpoints, the export bucket guards document generation,
/// and everything owning account data sits behind `require_auth`.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::LEGACY_TOKEN_HEADER),
        ]);

    let credential_routes = api::auth::limited_routes().layer(middleware::from_fn_with_state(
        ctx.clone(),
        rate_limit::auth_rate_limit,
    ));

    // change-password needs a session and still counts against the auth bucket
    let password_routes = api::auth::limited_session_routes()
        .layer(middleware::from_fn_with_state(ctx.clone(), auth::require_auth))
        .layer(middleware::from_fn_with_state(
            ctx.clone(),
            rate_limit::auth_rate_limit,
        ));

    let account_routes = api::auth::session_routes()
        .layer(middleware::from_fn_with_state(ctx.clone(), auth::require_auth));

    let data_routes = Router::new()
        .merge(api::profile::routes())
        .merge(api::clients::routes())
        .merge(api::invoices::routes())
        .merge(api::templates::routes())
        .layer(middleware::from_fn_with_state(ctx.clone(), auth::require_auth));

    let export_routes = api::export::routes()
        .layer(middleware::from_fn_with_state(ctx.clone(), auth::require_auth))
        .layer(middleware::from_fn_with_state(
            ctx.clone(),
            rate_limit::export_rate_limit,
        ));

    Router::new()
        .merge(api::health::routes())
        .merge(api::auth::open_routes())
        .merge(credential_routes)
        .merge(password_routes)
        .merge(account_routes)
        .merge(data_routes)
        .merge(export_routes)
        .with_state(ctx)
        .layer(middleware::from_fn(track_requests))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// Record request counts against the matched route
async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request
        .extensions()
        .get::<axum::extract::MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    metrics::HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), &path, response.status().as_str()])
        .inc();

    response
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "ok": false,
            "error": "NOT_FOUND",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> ApiResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("ToolHub backend listening on {}", addr);
    info!("   environment: {:?}", ctx.config.service.environment);
    info!("   public URL: {}", ctx.public_url());

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    // ConnectInfo feeds the per-address rate limiter keys
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
