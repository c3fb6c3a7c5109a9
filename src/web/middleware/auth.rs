use axum::{
    Extension,
    body::Body as AxumBody,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::services::user_service;
use crate::services::auth_service;
use crate::web::models::{AuthenticatedUser, CurrentUser};
use crate::web::{AppState, error::AppError};

/// Token from the Authorization header first, then the `token` cookie.
fn extract_token(req: &Request<AxumBody>, jar: &CookieJar) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .or_else(|| jar.get("token").map(|c| c.value().to_string()))
}

fn authenticate(token: &str, jwt_secret: &str) -> Option<AuthenticatedUser> {
    match auth_service::decode_jwt(token, jwt_secret) {
        Ok(claims) => Some(AuthenticatedUser {
            id: claims.user_id,
            username: claims.sub,
        }),
        Err(e) => {
            warn!(error = %e, "JWT decoding error during auth middleware.");
            None
        }
    }
}

pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&req, &jar)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
    let authenticated_user = authenticate(&token, &state.config.jwt_secret)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    req.extensions_mut().insert(authenticated_user);
    Ok(next.run(req).await)
}

/// Like [`auth`], but lets anonymous requests through with `CurrentUser(None)`.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Response {
    let viewer = extract_token(&req, &jar).and_then(|token| authenticate(&token, &state.config.jwt_secret));
    req.extensions_mut().insert(CurrentUser(viewer));
    next.run(req).await
}

/// Rejects callers whose account is not an administrator. Must run after [`auth`].
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let account = user_service::get_user_by_id(&state.db_pool, user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;
    if !account.is_admin || !account.is_active {
        debug!(user_id = user.id, "Non-admin rejected from admin route.");
        return Err(AppError::Forbidden("Administrator privileges required".to_string()));
    }
    Ok(next.run(req).await)
}
