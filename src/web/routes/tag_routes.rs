use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::db::entities::tag;
use crate::db::models::{TagDetails, TagGraphSnapshot, TagRelationDetails};
use crate::db::services::{self, TagFilter};
use crate::tag_graph::ValidationResult;
use crate::web::models::tag_models::{
    CreateTagRequest, GraphQuery, RelationRequest, TagListQuery, UpdateTagRequest,
};
use crate::web::models::{AuthenticatedUser, CurrentUser};
use crate::web::{AppError, AppJson, AppState};

/// Whose tags to show: the explicit `user_id`, else the caller.
fn target_user(requested: Option<i32>, viewer: &CurrentUser) -> Result<i32, AppError> {
    requested
        .or(viewer.id())
        .ok_or_else(|| AppError::InvalidInput("user_id is required".to_string()))
}

// --- Public handlers ---

async fn list_tags_handler(
    Extension(viewer): Extension<CurrentUser>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<TagListQuery>,
) -> Result<Json<Vec<tag::Model>>, AppError> {
    let user_id = target_user(query.user_id, &viewer)?;
    let filter = TagFilter {
        search: query.search,
        parent_id: query.parent_id,
    };
    let tags = services::list_tags(&app_state.db_pool, user_id, &filter).await?;
    Ok(Json(tags))
}

async fn get_tag_handler(
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<i32>,
) -> Result<Json<TagDetails>, AppError> {
    let details = services::get_tag_details(&app_state.db_pool, tag_id).await?;
    Ok(Json(details))
}

async fn get_graph_handler(
    Extension(viewer): Extension<CurrentUser>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<GraphQuery>,
) -> Result<Json<TagGraphSnapshot>, AppError> {
    let user_id = target_user(query.user_id, &viewer)?;
    let graph = services::get_graph(&app_state.db_pool, user_id).await?;
    Ok(Json(graph))
}

// --- Protected handlers ---

async fn create_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateTagRequest>,
) -> Result<(StatusCode, Json<TagDetails>), AppError> {
    let tag = services::create_tag(
        &app_state.db_pool,
        &app_state.user_locks,
        authenticated_user.id,
        payload.into(),
    )
    .await?;
    let details = services::get_tag_details(&app_state.db_pool, tag.id).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

async fn update_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<i32>,
    AppJson(payload): AppJson<UpdateTagRequest>,
) -> Result<Json<tag::Model>, AppError> {
    let tag = services::update_tag(&app_state.db_pool, tag_id, authenticated_user.id, payload.into()).await?;
    Ok(Json(tag))
}

async fn delete_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    services::delete_tag(&app_state.db_pool, &app_state.user_locks, tag_id, authenticated_user.id).await?;
    Ok(Json(json!({ "message": "Tag deleted" })))
}

async fn validate_relation_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RelationRequest>,
) -> Result<Json<ValidationResult>, AppError> {
    let check = services::validate_relation(
        &app_state.db_pool,
        authenticated_user.id,
        payload.parent_tag_id,
        payload.child_tag_id,
    )
    .await?;
    Ok(Json(check.into()))
}

async fn create_relation_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RelationRequest>,
) -> Result<(StatusCode, Json<TagRelationDetails>), AppError> {
    let relation = services::create_relation(
        &app_state.db_pool,
        &app_state.user_locks,
        authenticated_user.id,
        payload.parent_tag_id,
        payload.child_tag_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(relation)))
}

async fn delete_relation_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(relation_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    services::delete_relation(&app_state.db_pool, &app_state.user_locks, relation_id, authenticated_user.id)
        .await?;
    Ok(Json(json!({ "message": "Relation deleted" })))
}

// --- Routers ---

/// Read-only routes; expects `optional_auth` to provide the viewer.
pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tags_handler))
        .route("/graph", get(get_graph_handler))
        .route("/{tag_id}", get(get_tag_handler))
}

pub fn create_protected_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_tag_handler))
        .route("/{tag_id}", put(update_tag_handler).delete(delete_tag_handler))
        .route("/validate-relation", post(validate_relation_handler))
        .route("/relations", post(create_relation_handler))
        .route("/relations/{relation_id}", delete(delete_relation_handler))
}
