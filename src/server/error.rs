use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::InvoicerError;

/// Error returned by every handler; renders as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub InvoicerError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<InvoicerError> for ApiError {
    fn from(err: InvoicerError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(InvoicerError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(InvoicerError::Validation(rejection.body_text()))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            InvoicerError::Validation(_)
            | InvoicerError::Fields(_)
            | InvoicerError::InvalidPrefix(_)
            | InvoicerError::InvalidLineItem { .. } => StatusCode::BAD_REQUEST,
            InvoicerError::NotFound(_) => StatusCode::NOT_FOUND,
            InvoicerError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let status = self.status();
        let error = if !self.0.is_client_error() {
            tracing::error!(error = %self.0, "request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
            self.0.to_string()
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}
