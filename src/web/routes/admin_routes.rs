use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::db::entities::tag;
use crate::db::models::UserProfile;
use crate::db::services::TagChanges;
use crate::db::services::tag_article_service::{self, AdminTagView};
use crate::services::auth_service;
use crate::web::models::tag_models::{AdminTagQuery, AdminTagRequest, AdminTagUpdateRequest};
use crate::web::models::{AuthResponse, AuthenticatedUser, LoginRequest, RegisterRequest};
use crate::web::routes::auth_routes::with_session_cookie;
use crate::web::{AppError, AppJson, AppState};

async fn admin_login_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let session = auth_service::admin_login(&app_state.db_pool, &app_state.config, payload).await?;
    Ok(with_session_cookie(jar, session))
}

async fn register_admin_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let session =
        auth_service::register_admin(&app_state.db_pool, &app_state.config, authenticated_user.id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserProfile::private(&session.user),
            token: session.token,
        }),
    ))
}

async fn list_admin_tags_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<AdminTagQuery>,
) -> Result<Json<Vec<tag::Model>>, AppError> {
    let tags = tag_article_service::list_admin_tags(&app_state.db_pool, authenticated_user.id, query.search).await?;
    Ok(Json(tags))
}

async fn create_admin_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<AdminTagRequest>,
) -> Result<(StatusCode, Json<AdminTagView>), AppError> {
    let view = tag_article_service::create_tag_with_article(
        &app_state.db_pool,
        &app_state.user_locks,
        authenticated_user.id,
        payload.into(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update_admin_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<i32>,
    AppJson(payload): AppJson<AdminTagUpdateRequest>,
) -> Result<Json<AdminTagView>, AppError> {
    let changes = TagChanges {
        name: payload.name,
        description: payload.description,
        color: payload.color,
    };
    let view = tag_article_service::update_tag_with_article(
        &app_state.db_pool,
        &app_state.user_locks,
        tag_id,
        authenticated_user.id,
        changes,
        payload.content,
    )
    .await?;
    Ok(Json(view))
}

async fn delete_admin_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    tag_article_service::delete_tag_with_article(
        &app_state.db_pool,
        &app_state.user_locks,
        tag_id,
        authenticated_user.id,
    )
    .await?;
    Ok(Json(json!({ "message": "Tag deleted" })))
}

pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new().route("/login", post(admin_login_handler))
}

/// Routes that need both `auth` and `require_admin` layered on top.
pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register_admin_handler))
        .route("/tags", get(list_admin_tags_handler).post(create_admin_tag_handler))
        .route("/tags/{tag_id}", put(update_admin_tag_handler).delete(delete_admin_tag_handler))
}
