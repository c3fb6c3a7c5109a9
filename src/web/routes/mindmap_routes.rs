use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::db::models::{DocumentView, Page};
use crate::db::services::mindmap_service;
use crate::web::models::content_models::{ContentListParams, CreateDocumentRequest, UpdateDocumentRequest};
use crate::web::models::{AuthenticatedUser, CurrentUser};
use crate::web::{AppError, AppJson, AppState};

async fn list_mindmaps_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<ContentListParams>,
) -> Result<Json<Page<DocumentView>>, AppError> {
    let page = mindmap_service::list_mindmaps(&app_state.db_pool, &params.into()).await?;
    Ok(Json(page))
}

async fn get_mindmap_handler(
    Extension(viewer): Extension<CurrentUser>,
    State(app_state): State<Arc<AppState>>,
    Path(mindmap_id): Path<i32>,
) -> Result<Json<DocumentView>, AppError> {
    let mindmap = mindmap_service::get_mindmap(&app_state.db_pool, mindmap_id, viewer.id()).await?;
    Ok(Json(mindmap))
}

async fn create_mindmap_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentView>), AppError> {
    let mindmap = mindmap_service::create_mindmap(&app_state.db_pool, authenticated_user.id, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(mindmap)))
}

async fn update_mindmap_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(mindmap_id): Path<i32>,
    AppJson(payload): AppJson<UpdateDocumentRequest>,
) -> Result<Json<DocumentView>, AppError> {
    let mindmap =
        mindmap_service::update_mindmap(&app_state.db_pool, mindmap_id, authenticated_user.id, payload.into())
            .await?;
    Ok(Json(mindmap))
}

async fn delete_mindmap_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(mindmap_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    mindmap_service::delete_mindmap(&app_state.db_pool, mindmap_id, authenticated_user.id).await?;
    Ok(Json(json!({ "message": "Mindmap deleted" })))
}

pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_mindmaps_handler))
        .route("/{mindmap_id}", get(get_mindmap_handler))
}

pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_mindmap_handler))
        .route("/{mindmap_id}", put(update_mindmap_handler).delete(delete_mindmap_handler))
}
