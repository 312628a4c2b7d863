pub mod backup;
pub mod gedcom;
pub mod health;
pub mod operations;
pub mod places;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use crate::errors::ImportExportError;

/// JSON error body `{ "error", "code" }` with a status derived from the error kind.
pub struct ApiError(ImportExportError);

impl From<ImportExportError> for ApiError {
    fn from(err: ImportExportError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_conflict() {
            StatusCode::CONFLICT
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = Json(json!({
            "error": self.0.to_string(),
            "code": self.0.error_code(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename)
}
