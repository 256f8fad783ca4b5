/// Account and session endpoints
use crate::{
    account::{
        AccountSummary, AuthResponse, ChangePasswordRequest, ConfirmResetRequest, LoginRequest,
        RegisterRequest, RequestResetRequest,
    },
    auth::{self, CurrentUser},
    context::AppContext,
    error::{ApiResult, ValidationError},
};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// Credential endpoints guarded by the auth rate bucket
pub fn limited_routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/request-reset", post(request_reset))
        .route("/api/auth/reset", post(confirm_reset))
}

/// Session-authenticated endpoints that still count against the auth bucket
pub fn limited_session_routes() -> Router<AppContext> {
    Router::new().route("/api/auth/change-password", post(change_password))
}

/// Session-authenticated account endpoints
pub fn session_routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/pro/upgrade", post(upgrade_to_pro))
}

/// Endpoints with no guard at all
pub fn open_routes() -> Router<AppContext> {
    Router::new().route("/api/auth/logout", post(logout))
}

async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Response> {
    let (Some(email), Some(password)) = (req.email.as_deref(), req.password.as_deref()) else {
        return Err(ValidationError::MissingFields.into());
    };

    let account = ctx
        .accounts
        .register(email, password, req.name, req.marketing_opt_in)
        .await?;
    let session = ctx.sessions.create(account.id).await?;

    let mut response = Json(AuthResponse {
        ok: true,
        account: AccountSummary::from(&account),
        session_id: session.id.clone(),
    })
    .into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, auth::session_cookie_header(&ctx, &session.id)?);
    Ok(response)
}

async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let (Some(email), Some(password)) = (req.email.as_deref(), req.password.as_deref()) else {
        return Err(ValidationError::MissingFields.into());
    };

    let account = ctx.accounts.verify(email, password).await?;
    let session = ctx.sessions.create(account.id).await?;

    let mut response = Json(AuthResponse {
        ok: true,
        account: AccountSummary::from(&account),
        session_id: session.id.clone(),
    })
    .into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, auth::session_cookie_header(&ctx, &session.id)?);
    Ok(response)
}

/// Always answers 200 so registered addresses cannot be enumerated.
/// Outside production the token is echoed for testability.
async fn request_reset(
    State(ctx): State<AppContext>,
    Json(req): Json<RequestResetRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(email) = req.email.as_deref() else {
        return Err(ValidationError::MissingFields.into());
    };

    let mut body = json!({ "ok": true });

    if let Some(issue) = ctx.accounts.request_reset(email).await? {
        if let Err(e) = ctx
            .mailer
            .send_password_reset_email(
                &issue.email,
                issue.name.as_deref(),
                &issue.token,
                ctx.public_url(),
            )
            .await
        {
            // The caller still gets a 200; the token stays redeemable
            tracing::warn!("failed to send reset email: {}", e);
        }

        if !ctx.config.service.environment.is_production() {
            body["debug_token"] = json!(issue.token);
        }
    }

    Ok(Json(body))
}

async fn confirm_reset(
    State(ctx): State<AppContext>,
    Json(req): Json<ConfirmResetRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let (Some(token), Some(password)) = (req.token.as_deref(), req.password.as_deref()) else {
        return Err(ValidationError::MissingFields.into());
    };

    ctx.accounts.confirm_reset(token, password).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn change_password(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let (Some(current), Some(new)) = (req.current_password.as_deref(), req.new_password.as_deref())
    else {
        return Err(ValidationError::MissingFields.into());
    };

    ctx.accounts.change_password(user.user_id, current, new).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn me(
    State(ctx): State<AppContext>,
    user: CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    let account = ctx.accounts.get(user.user_id).await?;
    Ok(Json(json!({ "ok": true, "account": AccountSummary::from(&account) })))
}

async fn upgrade_to_pro(
    State(ctx): State<AppContext>,
    user: CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    ctx.accounts.set_pro(user.user_id).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Logout clears the client cookie only; the server-side session row
/// is intentionally left in place (no server-side revocation).
async fn logout(State(ctx): State<AppContext>) -> ApiResult<Response> {
    let mut response = Json(json!({ "ok": true })).into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, auth::clear_cookie_header(&ctx)?);
    Ok(response)
}
