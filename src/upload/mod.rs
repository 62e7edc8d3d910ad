//! Upload module
//!
//! Turns a `multipart/form-data` request body into an [`UploadedFile`] and
//! bridges it to the object store through a staging file.

use bytes::Bytes;
use thiserror::Error;

pub mod form;
pub mod staging;

pub use form::parse_upload_form;
pub use staging::StagedUpload;

/// Name of the form field carrying the file
pub const FILE_FIELD: &str = "file";

/// Content type used when the browser does not send one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Request is not multipart/form-data")]
    NotMultipart,

    #[error("No file was submitted in the 'file' field")]
    MissingFile,

    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("Malformed multipart body: {0}")]
    Malformed(String),

    #[error("Upload exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("Staging error: {0}")]
    Staging(#[from] std::io::Error),
}

/// One file taken from the upload form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename exactly as the browser sent it
    pub original_name: String,
    /// Object key derived from the filename
    pub key: String,
    pub content_type: String,
    pub content: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}
