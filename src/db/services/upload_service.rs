use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::entities::{prelude::*, upload};
use crate::db::models::{Page, Pagination};
use crate::services::file_storage::{self, FileStorage};

pub const DEFAULT_UPLOAD_PAGE_SIZE: u64 = 20;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("File storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Upload not found")]
    NotFound,
    #[error("You do not have access to this upload")]
    Forbidden,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// An upload record with the public URL of its file.
#[derive(Debug, Clone, Serialize)]
pub struct UploadView {
    #[serde(flatten)]
    pub upload: upload::Model,
    pub url: String,
}

impl From<upload::Model> for UploadView {
    fn from(upload: upload::Model) -> Self {
        let url = format!("/uploads/{}", upload.filename);
        UploadView { upload, url }
    }
}

/// Stores an image and records it for `user_id`.
pub async fn store_image<C>(
    conn: &C,
    storage: &FileStorage,
    user_id: i32,
    original_filename: &str,
    bytes: &[u8],
) -> Result<UploadView, UploadError>
where
    C: ConnectionTrait,
{
    if bytes.is_empty() {
        return Err(UploadError::InvalidInput("No file selected".to_string()));
    }
    let original_filename = file_storage::sanitize_filename(original_filename);
    let extension = file_storage::allowed_extension(&original_filename).ok_or_else(|| {
        UploadError::InvalidInput(format!(
            "Unsupported file type, allowed: {}",
            file_storage::ALLOWED_IMAGE_EXTENSIONS.join(", ")
        ))
    })?;

    let stored = storage.save(&extension, bytes).await?;
    let record = upload::ActiveModel {
        user_id: Set(user_id),
        filename: Set(stored.filename.clone()),
        original_filename: Set(original_filename),
        file_path: Set(stored.path.to_string_lossy().into_owned()),
        file_size: Set(stored.size as i64),
        mime_type: Set(stored.mime_type),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await;

    match record {
        Ok(record) => {
            info!(user_id, upload_id = record.id, filename = %record.filename, "Image uploaded.");
            Ok(record.into())
        }
        Err(e) => {
            if let Err(io_err) = storage.remove(&stored.filename).await {
                warn!(filename = %stored.filename, error = %io_err, "Failed to clean up orphaned upload.");
            }
            Err(e.into())
        }
    }
}

/// The caller's uploads, newest first.
pub async fn list_uploads<C>(conn: &C, user_id: i32, page: u64, limit: u64) -> Result<Page<UploadView>, UploadError>
where
    C: ConnectionTrait,
{
    let page = page.max(1);
    let limit = limit.clamp(1, 100);
    let paginator = Upload::find()
        .filter(upload::Column::UserId.eq(user_id))
        .order_by_desc(upload::Column::CreatedAt)
        .order_by_desc(upload::Column::Id)
        .paginate(conn, limit);
    let totals = paginator.num_items_and_pages().await?;
    let uploads = paginator.fetch_page(page - 1).await?;

    Ok(Page {
        items: uploads.into_iter().map(UploadView::from).collect(),
        pagination: Pagination::new(page, limit, totals.number_of_items, totals.number_of_pages),
    })
}

/// Deletes the record, then the file. A failed file removal is only logged.
pub async fn delete_upload<C>(
    conn: &C,
    storage: &FileStorage,
    upload_id: i32,
    user_id: i32,
) -> Result<(), UploadError>
where
    C: ConnectionTrait,
{
    let record = Upload::find_by_id(upload_id)
        .one(conn)
        .await?
        .ok_or(UploadError::NotFound)?;
    if record.user_id != user_id {
        return Err(UploadError::Forbidden);
    }

    Upload::delete_by_id(upload_id).exec(conn).await?;
    if let Err(e) = storage.remove(&record.filename).await {
        warn!(upload_id, filename = %record.filename, error = %e, "Failed to remove uploaded file.");
    }
    info!(user_id, upload_id, "Upload deleted.");
    Ok(())
}
