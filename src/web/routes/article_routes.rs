use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::db::models::{ArticleView, Page};
use crate::db::services::article_service;
use crate::web::models::content_models::{ContentListParams, CreateArticleRequest, UpdateArticleRequest};
use crate::web::models::{AuthenticatedUser, CurrentUser};
use crate::web::{AppError, AppJson, AppState};

async fn list_articles_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ContentListParams>,
) -> Result<Json<Page<ArticleView>>, AppError> {
    let page = article_service::list_articles(&app_state.db_pool, &params.into()).await?;
    Ok(Json(page))
}

async fn get_article_handler(
    Extension(viewer): Extension<CurrentUser>,
    State(app_state): State<Arc<AppState>>,
    Path(article_id): Path<i32>,
) -> Result<Json<ArticleView>, AppError> {
    let article = article_service::get_article(&app_state.db_pool, article_id, viewer.id()).await?;
    Ok(Json(article))
}

async fn create_article_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateArticleRequest>,
) -> Result<(StatusCode, Json<ArticleView>), AppError> {
    let article = article_service::create_article(&app_state.db_pool, authenticated_user.id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

async fn update_article_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(article_id): Path<i32>,
    AppJson(payload): AppJson<UpdateArticleRequest>,
) -> Result<Json<ArticleView>, AppError> {
    let article =
        article_service::update_article(&app_state.db_pool, article_id, authenticated_user.id, payload.into())
            .await?;
    Ok(Json(article))
}

async fn delete_article_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(article_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    article_service::delete_article(&app_state.db_pool, article_id, authenticated_user.id).await?;
    Ok(Json(json!({ "message": "Article deleted" })))
}

async fn publish_article_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(article_id): Path<i32>,
) -> Result<Json<ArticleView>, AppError> {
    let article = article_service::publish_article(&app_state.db_pool, article_id, authenticated_user.id).await?;
    Ok(Json(article))
}

pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_articles_handler))
        .route("/{article_id}", get(get_article_handler))
}

pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_article_handler))
        .route("/{article_id}", put(update_article_handler).delete(delete_article_handler))
        .route("/{article_id}/publish", post(publish_article_handler))
}
