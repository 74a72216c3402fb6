use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;

/// Wire shape of every error response: `{"error": "<message>"}`.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    source: &'static str,
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(source: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            source,
            status,
            message: message.into(),
        }
    }

    pub fn not_found(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, message)
    }

    /// Map a repository failure. Data-access errors surface their upstream
    /// message verbatim with a 500; there is no retry.
    pub fn from_repo(source: &'static str, err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::not_found(source, "resource not found"),
            RepoError::DataAccess { message } => {
                Self::new(source, StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from_message(self.source, self.status, self.message.clone());
        let mut response = (
            self.status,
            Json(ApiErrorBody {
                error: self.message,
            }),
        )
            .into_response();
        report.attach(&mut response);
        response
    }
}
