/// Authentication middleware and extractors
///
/// Requests may carry two credential kinds during the migration window:
/// the modern HTTP-only session cookie, and the deprecated
/// `x-session-token` bearer header. Resolution order is cookie first,
/// then legacy; a successful legacy resolution mints a modern session
/// whose cookie rides back on the response.
use crate::{context::AppContext, error::ApiError, session::Credential};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

/// Deprecated bearer header accepted as a fallback credential
pub const LEGACY_TOKEN_HEADER: &str = "x-session-token";

/// Authenticated account attached to the request by `require_auth`
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: i64,
    pub session_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Require an authenticated session; inserts `CurrentUser` into the
/// request extensions for downstream extractors.
pub async fn require_auth(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let mut resolved = None;

    if let Some(cookie) = jar.get(&ctx.config.sessions.cookie_name) {
        resolved = ctx
            .sessions
            .resolve(Credential::CookieSession(cookie.value().to_string()))
            .await
            .ok();
    }

    if resolved.is_none() {
        if let Some(token) = request
            .headers()
            .get(LEGACY_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
        {
            resolved = ctx
                .sessions
                .resolve(Credential::LegacyToken(token.to_string()))
                .await
                .ok();
        }
    }

    let resolved = resolved.ok_or(ApiError::Unauthenticated)?;
    let minted = resolved.minted;
    request.extensions_mut().insert(CurrentUser {
        user_id: resolved.user_id,
        session_id: resolved.session_id,
    });

    let mut response = next.run(request).await;

    // A legacy upgrade mints a fresh session: hand the cookie back
    if let Some(session) = minted {
        response
            .headers_mut()
            .append(header::SET_COOKIE, session_cookie_header(&ctx, &session.id)?);
    }

    Ok(response)
}

/// Set-Cookie value carrying a session id
pub fn session_cookie_header(ctx: &AppContext, session_id: &str) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ctx.config.sessions.cookie_name,
        session_id,
        ctx.config.sessions.cookie_max_age_days * 86400
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("invalid session cookie: {}", e)))
}

/// Set-Cookie value that clears the session cookie client-side
pub fn clear_cookie_header(ctx: &AppContext) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        ctx.config.sessions.cookie_name
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("invalid session cookie: {}", e)))
}
