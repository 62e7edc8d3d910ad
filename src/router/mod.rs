//! Request router
//!
//! Maps a method and path onto one of the application's routes.

use crate::storage::keys::decode_key;
use thiserror::Error;

/// Router errors
#[derive(Error, Debug, PartialEq)]
pub enum RouterError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Application routes
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// GET /
    UploadForm,
    /// POST /upload
    Upload,
    /// GET /files
    ListFiles,
    /// GET /download/{filename}
    Download { filename: String },
    /// GET /health
    Health,
}

impl Route {
    /// Label used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Route::UploadForm => "upload_form",
            Route::Upload => "upload",
            Route::ListFiles => "list_files",
            Route::Download { .. } => "download",
            Route::Health => "health",
        }
    }
}

/// Request parser
pub struct RequestParser;

impl RequestParser {
    /// Parse an HTTP method and path into a route
    pub fn parse(method: &str, path: &str) -> Result<Route, RouterError> {
        let (route, allowed) = match path {
            "/" => (Route::UploadForm, "GET"),
            "/upload" => (Route::Upload, "POST"),
            "/files" | "/files/" => (Route::ListFiles, "GET"),
            "/health" => (Route::Health, "GET"),
            _ => match path.strip_prefix("/download/") {
                Some(segment) => (Self::download_route(segment)?, "GET"),
                None => return Err(RouterError::NotFound(path.to_string())),
            },
        };

        // hyper drops the body of HEAD responses.
        if method == allowed || (allowed == "GET" && method == "HEAD") {
            Ok(route)
        } else {
            Err(RouterError::MethodNotAllowed(format!(
                "{} {} (allowed: {})",
                method, path, allowed
            )))
        }
    }

    fn download_route(segment: &str) -> Result<Route, RouterError> {
        if segment.is_empty() || segment.contains('/') {
            return Err(RouterError::InvalidPath(format!("/download/{}", segment)));
        }

        let filename = decode_key(segment).ok_or_else(|| {
            RouterError::InvalidPath(format!("filename is not valid UTF-8: {}", segment))
        })?;

        Ok(Route::Download { filename })
    }
}
