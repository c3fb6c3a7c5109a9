use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::db::models::UserProfile;
use crate::db::services::user_service;
use crate::services::auth_service::{self, AuthSession};
use crate::web::models::{AuthResponse, AuthenticatedUser, LoginRequest, ProfileUpdateRequest, RegisterRequest};
use crate::web::{AppError, AppJson, AppState};

/// Attaches the session token as an http-only cookie.
pub(crate) fn with_session_cookie(jar: CookieJar, session: AuthSession) -> (CookieJar, Json<AuthResponse>) {
    let auth_cookie = Cookie::build(("token", session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();
    let body = AuthResponse {
        user: UserProfile::private(&session.user),
        token: session.token,
    };
    (jar.add(auth_cookie), Json(body))
}

async fn register_handler(
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let session = auth_service::register_user(&app_state.db_pool, &app_state.config, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserProfile::private(&session.user),
            token: session.token,
        }),
    ))
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let session = auth_service::login_user(&app_state.db_pool, &app_state.config, payload).await?;
    Ok(with_session_cookie(jar, session))
}

async fn me_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UserProfile>, AppError> {
    let user = user_service::get_user_by_id(&app_state.db_pool, authenticated_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(UserProfile::private(&user)))
}

async fn update_profile_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<ProfileUpdateRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let user = auth_service::update_profile(&app_state.db_pool, authenticated_user.id, payload).await?;
    Ok(Json(UserProfile::private(&user)))
}

pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
}

pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(me_handler))
        .route("/profile", put(update_profile_handler))
}
