use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::db::models::{DocumentView, Page};
use crate::db::services::roadmap_service;
use crate::web::models::content_models::{ContentListParams, CreateDocumentRequest, UpdateDocumentRequest};
use crate::web::models::{AuthenticatedUser, CurrentUser};
use crate::web::{AppError, AppJson, AppState};

async fn list_roadmaps_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ContentListParams>,
) -> Result<Json<Page<DocumentView>>, AppError> {
    let page = roadmap_service::list_roadmaps(&app_state.db_pool, &params.into()).await?;
    Ok(Json(page))
}

async fn get_roadmap_handler(
    Extension(viewer): Extension<CurrentUser>,
    State(app_state): State<Arc<AppState>>,
    Path(roadmap_id): Path<i32>,
) -> Result<Json<DocumentView>, AppError> {
    let roadmap = roadmap_service::get_roadmap(&app_state.db_pool, roadmap_id, viewer.id()).await?;
    Ok(Json(roadmap))
}

async fn create_roadmap_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentView>), AppError> {
    let roadmap = roadmap_service::create_roadmap(&app_state.db_pool, authenticated_user.id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(roadmap)))
}

async fn update_roadmap_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(roadmap_id): Path<i32>,
    AppJson(payload): AppJson<UpdateDocumentRequest>,
) -> Result<Json<DocumentView>, AppError> {
    let roadmap =
        roadmap_service::update_roadmap(&app_state.db_pool, roadmap_id, authenticated_user.id, payload.into())
            .await?;
    Ok(Json(roadmap))
}

async fn delete_roadmap_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(roadmap_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    roadmap_service::delete_roadmap(&app_state.db_pool, roadmap_id, authenticated_user.id).await?;
    Ok(Json(json!({ "message": "Roadmap deleted" })))
}

pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_roadmaps_handler))
        .route("/{roadmap_id}", get(get_roadmap_handler))
}

pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_roadmap_handler))
        .route("/{roadmap_id}", put(update_roadmap_handler).delete(delete_roadmap_handler))
}
