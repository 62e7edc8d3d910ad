//! Handler-level errors
//!
//! Every failure a handler can produce ends up here, and each variant maps to
//! one status code and a JSON body of the form `{"error": "..."}`. Storage
//! failures only carry a generic message; the cause is logged where it
//! happens.

use crate::router::RouterError;
use crate::upload::UploadError;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use thiserror::Error;

/// API errors
#[derive(Error, Debug, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Error uploading file")]
    StorageWrite,

    #[error("Error listing files")]
    StorageList,

    #[error("Error generating download URL")]
    StorageSign,

    #[error("File not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Not found")]
    RouteNotFound,
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::StorageWrite | ApiError::StorageList | ApiError::StorageSign => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Label for `cloudshelf_errors_total`
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::StorageWrite => "storage_write",
            ApiError::StorageList => "storage_list",
            ApiError::StorageSign => "storage_sign",
            ApiError::NotFound => "not_found",
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::RouteNotFound => "route_not_found",
        }
    }

    /// JSON error response
    pub fn into_response(self) -> Response<String> {
        let body = serde_json::json!({ "error": self.to_string() }).to_string();
        let mut response = Response::new(body);
        *response.status_mut() = self.status();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { limit } => ApiError::PayloadTooLarge { limit },
            UploadError::Staging(e) => {
                tracing::error!(error = %e, "Staging the upload failed");
                ApiError::StorageWrite
            }
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::MethodNotAllowed(_) => ApiError::MethodNotAllowed,
            RouterError::NotFound(_) | RouterError::InvalidPath(_) => ApiError::RouteNotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_use_generic_messages() {
        assert_eq!(ApiError::StorageWrite.to_string(), "Error uploading file");
        assert_eq!(ApiError::StorageList.to_string(), "Error listing files");
        assert_eq!(
            ApiError::StorageSign.to_string(),
            "Error generating download URL"
        );
        assert_eq!(ApiError::NotFound.to_string(), "File not found");
    }

    #[test]
    fn test_json_body() {
        let response = ApiError::StorageList.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: serde_json::Value = serde_json::from_str(response.body()).unwrap();
        assert_eq!(body["error"], "Error listing files");
    }

    #[test]
    fn test_upload_error_mapping() {
        assert_eq!(
            ApiError::from(UploadError::TooLarge { limit: 10 }).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::from(UploadError::MissingFile),
            ApiError::Validation("No file was submitted in the 'file' field".into())
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(ApiError::from(UploadError::Staging(io)), ApiError::StorageWrite);
    }

    #[test]
    fn test_router_error_mapping() {
        assert_eq!(
            ApiError::from(RouterError::MethodNotAllowed("GET /upload".into())).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::from(RouterError::InvalidPath("/download/".into())),
            ApiError::RouteNotFound
        );
    }
}
