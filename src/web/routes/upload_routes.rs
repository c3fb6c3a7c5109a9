use axum::{
    Json, Router,
    extract::{Extension, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::db::models::Page;
use crate::db::services::upload_service::{self, DEFAULT_UPLOAD_PAGE_SIZE, UploadView};
use crate::web::models::{AuthenticatedUser, PageParams};
use crate::web::{AppError, AppState};

async fn upload_image_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadView>), AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::InvalidInput(format!("Invalid multipart payload: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::InvalidInput(format!("Failed to read file field: {err}")))?;
        file = Some((original_filename, bytes.to_vec()));
    }

    let (original_filename, bytes) =
        file.ok_or_else(|| AppError::InvalidInput("No file part in the request".to_string()))?;
    let upload = upload_service::store_image(
        &app_state.db_pool,
        &app_state.storage,
        authenticated_user.id,
        &original_filename,
        &bytes,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(upload)))
}

async fn list_uploads_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<UploadView>>, AppError> {
    let page = upload_service::list_uploads(
        &app_state.db_pool,
        authenticated_user.id,
        params.page.unwrap_or(1),
        params.limit.unwrap_or(DEFAULT_UPLOAD_PAGE_SIZE),
    )
    .await?;
    Ok(Json(page))
}

async fn delete_upload_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(upload_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    upload_service::delete_upload(&app_state.db_pool, &app_state.storage, upload_id, authenticated_user.id).await?;
    Ok(Json(json!({ "message": "Upload deleted" })))
}

pub fn create_uploads_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_uploads_handler))
        .route("/image", post(upload_image_handler))
        .route("/{upload_id}", delete(delete_upload_handler))
}
