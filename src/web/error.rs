use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::db::services::ContentError;
use crate::db::services::tag_service::TagServiceError;
use crate::db::services::upload_service::UploadError;
use crate::db::services::user_service::UserServiceError;
use crate::services::auth_service::AuthError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid relation: {0}")]
    InvalidRelation(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// Stable machine-readable name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::InvalidRelation(_) => "invalid_relation",
            AppError::InvalidCredentials | AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::InvalidRelation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let error_message = match self {
            AppError::InvalidInput(msg)
            | AppError::InvalidRelation(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg,
            AppError::InvalidCredentials => "Invalid username or password".to_string(),
            AppError::DatabaseError(msg) => {
                error!(error = %msg, "Database error while handling request.");
                "Database error".to_string()
            }
            AppError::InternalServerError(msg) => {
                error!(error = %msg, "Internal error while handling request.");
                "Internal server error".to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": error_message, "kind": kind }))).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalServerError(format!("JSON serialization/deserialization error: {err}"))
    }
}

/// Malformed or incomplete request bodies are the caller's fault.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<TagServiceError> for AppError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::DbErr(e) => e.into(),
            TagServiceError::TagNotFound(_) | TagServiceError::RelationNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            TagServiceError::Forbidden => AppError::Forbidden(err.to_string()),
            TagServiceError::DuplicateName(_) | TagServiceError::DuplicateRelation(_, _) => {
                AppError::Conflict(err.to_string())
            }
            TagServiceError::InvalidRelation(msg) => AppError::InvalidRelation(msg),
            TagServiceError::InvalidInput(msg) => AppError::InvalidInput(msg),
        }
    }
}

impl From<ContentError> for AppError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::DbErr(e) => e.into(),
            ContentError::NotFound(_) => AppError::NotFound(err.to_string()),
            ContentError::Forbidden(_) => AppError::Forbidden(err.to_string()),
            ContentError::InvalidInput(msg) => AppError::InvalidInput(msg),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::DbErr(e) => e.into(),
            UploadError::Io(e) => AppError::InternalServerError(format!("File storage error: {e}")),
            UploadError::NotFound => AppError::NotFound(err.to_string()),
            UploadError::Forbidden => AppError::Forbidden(err.to_string()),
            UploadError::InvalidInput(msg) => AppError::InvalidInput(msg),
        }
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::DbErr(e) => e.into(),
            UserServiceError::UserNotFound => AppError::NotFound(err.to_string()),
            UserServiceError::DuplicateUsername(_) | UserServiceError::DuplicateEmail(_) => {
                AppError::Conflict(err.to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::User(e) => e.into(),
            AuthError::InvalidInput(msg) => AppError::InvalidInput(msg),
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::InactiveAccount | AuthError::NotAdmin => AppError::Forbidden(err.to_string()),
            AuthError::PasswordHashing(msg) => AppError::InternalServerError(msg),
            AuthError::Token(_) => AppError::Unauthorized(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_tag_errors_map_to_statuses() {
        let cases = [
            (TagServiceError::TagNotFound(1), StatusCode::NOT_FOUND, "not_found"),
            (TagServiceError::Forbidden, StatusCode::FORBIDDEN, "forbidden"),
            (TagServiceError::DuplicateName("a".into()), StatusCode::CONFLICT, "conflict"),
            (TagServiceError::DuplicateRelation(1, 2), StatusCode::CONFLICT, "conflict"),
            (
                TagServiceError::InvalidRelation("cycle".into()),
                StatusCode::BAD_REQUEST,
                "invalid_relation",
            ),
            (TagServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST, "invalid_input"),
        ];
        for (err, status, kind) in cases {
            let (got_status, body) = body_json(AppError::from(err)).await;
            assert_eq!(got_status, status);
            assert_eq!(body["kind"], kind);
        }
    }

    #[tokio::test]
    async fn test_internal_details_are_not_leaked() {
        let (status, body) = body_json(AppError::DatabaseError("connection refused at 10.0.0.3".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Database error");
        assert_eq!(body["kind"], "internal");
    }
}
