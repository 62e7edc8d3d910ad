//! Multipart form parsing
//!
//! Only the first field named `file` is taken; every other field is skipped.
//! Browsers submit an empty `file` part with `filename=""` when nothing was
//! chosen, which is treated the same as a missing field.

use super::{UploadError, UploadedFile, DEFAULT_CONTENT_TYPE, FILE_FIELD};
use crate::storage::keys::object_key_for;
use bytes::Bytes;
use std::convert::Infallible;

/// Parse a buffered `multipart/form-data` body
pub async fn parse_upload_form(
    content_type: Option<&str>,
    body: Bytes,
) -> Result<UploadedFile, UploadError> {
    let content_type = content_type.ok_or(UploadError::NotMultipart)?;
    let boundary = multer::parse_boundary(content_type).map_err(|_| UploadError::NotMultipart)?;

    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Malformed(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        if original_name.is_empty() {
            return Err(UploadError::MissingFile);
        }

        let key = object_key_for(&original_name)
            .ok_or_else(|| UploadError::InvalidFilename(original_name.clone()))?;

        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let content = field
            .bytes()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))?;

        return Ok(UploadedFile {
            original_name,
            key,
            content_type,
            content,
        });
    }

    Err(UploadError::MissingFile)
}
