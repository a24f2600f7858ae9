use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use reel_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Store(store) => match store {
                StoreError::NotFound => (StatusCode::NOT_FOUND, store.to_string()),
                StoreError::Validation(_) => (StatusCode::BAD_REQUEST, store.to_string()),
                StoreError::PermissionDenied(_) => (StatusCode::FORBIDDEN, store.to_string()),
                StoreError::InvalidCode | StoreError::CodeExpired => {
                    (StatusCode::UNPROCESSABLE_ENTITY, store.to_string())
                }
                other => {
                    tracing::error!(error = %other, "store operation failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            ServerError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
