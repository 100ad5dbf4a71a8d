use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::aggregate::AggregateError;
use crate::page::PageError;

const PAYLOAD_GUIDANCE: &str =
    "Request payload exceeds the size limit. Send fewer URLs or less location data per request.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Request payload too large")]
    PayloadTooLarge,

    #[error("{0}")]
    Navigation(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Navigation(_) | AppError::Browser(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<AggregateError> for AppError {
    fn from(e: AggregateError) -> Self {
        AppError::Navigation(e.to_string())
    }
}

impl From<PageError> for AppError {
    fn from(e: PageError) -> Self {
        AppError::Browser(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        let body = match &self {
            AppError::PayloadTooLarge => json!({
                "success": false,
                "error": self.to_string(),
                "details": PAYLOAD_GUIDANCE,
            }),
            _ => json!({"success": false, "error": self.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            AppError::Validation("URL is required".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            AppError::Browser("crashed".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn navigation_failures_keep_their_message() {
        let err: AppError =
            AggregateError::Navigation(PageError::Timeout("30s".into())).into();
        assert!(err.to_string().starts_with("Failed to load page"));
    }
}
