//! Request handlers
//!
//! [`handle_request`] is generic over the request body so the same code path
//! serves hyper's `Incoming` in production and `Full<Bytes>` in tests.

use super::{ApiError, AppState};
use crate::metrics;
use crate::router::{RequestParser, Route};
use crate::storage::StorageError;
use crate::upload::{parse_upload_form, StagedUpload, UploadError};
use crate::views;
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use hyper::{Request, Response, StatusCode};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn, Span};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Route a request and produce its response
///
/// Never fails: every error is rendered as a JSON error response.
#[instrument(
    name = "http.request",
    skip_all,
    fields(method = %req.method(), path = %req.uri().path(), status = tracing::field::Empty)
)]
pub async fn handle_request<B>(req: Request<B>, state: Arc<AppState>) -> Response<String>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let route = RequestParser::parse(req.method().as_str(), req.uri().path());
    let route_name = route.as_ref().map(Route::name).unwrap_or("unmatched");

    let result = match route {
        Ok(Route::UploadForm) => Ok(html(views::upload_form())),
        Ok(Route::Upload) => upload(req, &state).await,
        Ok(Route::ListFiles) => list_files(&state).await,
        Ok(Route::Download { filename }) => download(&filename, &state).await,
        Ok(Route::Health) => Ok(plain(StatusCode::OK, "ok")),
        Err(e) => {
            info!(error = %e, "No route");
            Err(ApiError::from(e))
        }
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            if e.status().is_server_error() {
                error!(error = %e, "Request failed");
            } else {
                warn!(error = %e, "Request rejected");
            }
            if route_name == "upload" {
                metrics::record_upload_failure();
            }
            metrics::record_error(e.error_type());
            e.into_response()
        }
    };

    let status = response.status().as_u16();
    Span::current().record("status", status);
    metrics::record_request(route_name, status);
    response
}

/// POST /upload
#[instrument(
    name = "upload",
    skip_all,
    fields(key = tracing::field::Empty, bytes = tracing::field::Empty)
)]
async fn upload<B>(req: Request<B>, state: &AppState) -> Result<Response<String>, ApiError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let limit = state.config.upload.max_file_size;
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // Reject early when the client announces an oversized body.
    let announced = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if matches!(announced, Some(len) if len > limit as u64) {
        return Err(UploadError::TooLarge { limit }.into());
    }

    let body = collect_limited(req.into_body(), limit).await?;
    let file = parse_upload_form(content_type.as_deref(), body).await?;

    let span = Span::current();
    span.record("key", file.key.as_str());
    span.record("bytes", file.size());

    let staged = StagedUpload::write(&state.staging_dir(), file.content.clone())
        .await
        .map_err(UploadError::Staging)?;
    let bytes = staged.read().await.map_err(UploadError::Staging)?;

    let started = Instant::now();
    let result = state.store.put(&file.key, bytes, &file.content_type).await;
    metrics::record_storage_duration("put", started.elapsed().as_secs_f64());
    drop(staged);

    result.map_err(|e| {
        error!(key = %file.key, error = %e, "Storing the upload failed");
        ApiError::StorageWrite
    })?;

    metrics::record_upload_success(file.size() as u64);
    info!(
        key = %file.key,
        original_name = %file.original_name,
        content_type = %file.content_type,
        "Upload stored"
    );

    Ok(redirect(HeaderValue::from_static("/files")))
}

/// Buffer the body, failing with `TooLarge` past `limit` bytes
async fn collect_limited<B>(body: B, limit: usize) -> Result<Bytes, UploadError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(UploadError::TooLarge { limit })
        }
        Err(e) => Err(UploadError::Malformed(format!("failed to read body: {}", e))),
    }
}

/// GET /files
#[instrument(name = "list_files", skip_all)]
async fn list_files(state: &AppState) -> Result<Response<String>, ApiError> {
    let started = Instant::now();
    let result = state.store.list().await;
    metrics::record_storage_duration("list", started.elapsed().as_secs_f64());

    let objects = result.map_err(|e| {
        error!(error = %e, "Listing objects failed");
        ApiError::StorageList
    })?;

    info!(count = objects.len(), "Listed objects");
    Ok(html(views::file_list(&objects)))
}

/// GET /download/{filename}
#[instrument(name = "download", skip(state))]
async fn download(filename: &str, state: &AppState) -> Result<Response<String>, ApiError> {
    let started = Instant::now();
    let result = state
        .store
        .sign_read_url(filename, state.config.upload.signed_url_ttl())
        .await;
    metrics::record_storage_duration("sign", started.elapsed().as_secs_f64());

    let url = result.map_err(|e| match e {
        StorageError::NotFound(_) => ApiError::NotFound,
        other => {
            error!(error = %other, "Signing download URL failed");
            ApiError::StorageSign
        }
    })?;

    let location = HeaderValue::from_str(&url).map_err(|e| {
        error!(error = %e, "Signed URL is not a valid header value");
        ApiError::StorageSign
    })?;

    let mut response = redirect(location);
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

fn html(body: String) -> Response<String> {
    let mut response = Response::new(body);
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn plain(status: StatusCode, body: &str) -> Response<String> {
    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

fn redirect(location: HeaderValue) -> Response<String> {
    let mut response = Response::new(String::new());
    *response.status_mut() = StatusCode::FOUND;
    response.headers_mut().insert(LOCATION, location);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    #[tokio::test]
    async fn test_collect_within_limit() {
        let body = Full::new(Bytes::from("hello"));
        assert_eq!(collect_limited(body, 5).await.unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_collect_over_limit() {
        let body = Full::new(Bytes::from("hello!"));
        assert!(matches!(
            collect_limited(body, 5).await,
            Err(UploadError::TooLarge { limit: 5 })
        ));
    }

    #[test]
    fn test_redirect() {
        let response = redirect(HeaderValue::from_static("/files"));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/files");
        assert!(response.body().is_empty());
    }
}
