//! Public API types

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde_json::json;

use crate::session::SessionError;

// Errors

pub enum ApiError {
    Session(SessionError),
    NotFound(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(SessionError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Session(SessionError::Configuration { .. }) => StatusCode::CONFLICT,
            ApiError::Session(SessionError::PipelineUnavailable { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Session(SessionError::MetadataUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (kind, message) = match self {
            ApiError::Session(e) => (e.kind(), e.to_string()),
            ApiError::NotFound(what) => ("not_found", format!("{} not found", what)),
            ApiError::Internal(e) => ("internal", format!("Something went wrong: {:#}", e)),
        };

        // Always log the error
        tracing::error!("{}", message);

        (status, Json(json!({"error": kind, "message": message}))).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` or `Result<_, SessionError>` to turn them into
/// `Result<_, ApiError>`. A rejected JSON body is invalid input.
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = match err.into().downcast::<SessionError>() {
            Ok(e) => return Self::Session(e),
            Err(e) => e,
        };
        match err.downcast::<JsonRejection>() {
            Ok(rejection) => Self::Session(SessionError::InvalidInput {
                message: rejection.body_text(),
            }),
            Err(e) => Self::Internal(e),
        }
    }
}

// Re-export public types from each route

pub mod chat {
    pub use crate::api::routes::chat::public::*;
}

pub mod metrics {
    pub use crate::api::routes::metrics::public::*;
}

pub mod services {
    pub use crate::api::routes::services::public::*;
}
