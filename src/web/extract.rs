use axum::extract::FromRequest;

use crate::web::AppError;

/// `Json` body extractor whose rejections render as `AppError::InvalidInput`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
