//! Per-verb protocol handlers
//!
//! [`TusHandler`] owns the store, the per-upload locks, and the protocol
//! configuration. Each handler consumes what it needs of the request and
//! produces a complete response, so callers can forward responses verbatim
//! or inspect them (the gateway rewraps successful creations).

use crate::error::{Result, TusError};
use crate::lock::UploadLocks;
use crate::url::{absolute_url, ForwardedContext};
use crate::{headers, metadata, OFFSET_OCTET_STREAM, TUS_EXTENSIONS, TUS_VERSION};
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use media_store::{ByteStream, UploadDescriptor, UploadStore};
use std::sync::Arc;
use tracing::{debug, info};

/// Protocol configuration.
#[derive(Clone, Debug)]
pub struct TusConfig {
    /// Largest accepted `Upload-Length`, advertised as `Tus-Max-Size`.
    pub max_size: Option<u64>,
    /// Honor `X-Forwarded-*` / `Forwarded` when building upload URLs.
    pub respect_forwarded_headers: bool,
}

impl Default for TusConfig {
    fn default() -> Self {
        Self {
            max_size: None,
            respect_forwarded_headers: true,
        }
    }
}

/// The resumable upload protocol over an [`UploadStore`].
#[derive(Clone)]
pub struct TusHandler {
    store: Arc<dyn UploadStore>,
    locks: UploadLocks,
    config: TusConfig,
}

impl TusHandler {
    /// Create a handler over the given store
    pub fn new(store: Arc<dyn UploadStore>, config: TusConfig) -> Self {
        Self {
            store,
            locks: UploadLocks::new(),
            config,
        }
    }

    /// The store this handler writes into
    pub fn store(&self) -> &Arc<dyn UploadStore> {
        &self.store
    }

    /// POST: create an upload, optionally writing a first chunk.
    pub async fn create(&self, req: Request) -> Response {
        self.handle_create(req).await.unwrap_or_else(error_response)
    }

    /// HEAD: report the current offset of an upload.
    pub async fn status(&self, headers: &HeaderMap, id: &str) -> Response {
        self.handle_status(headers, id)
            .await
            .unwrap_or_else(error_response)
    }

    /// PATCH: append a chunk at the declared offset.
    pub async fn append(&self, id: &str, req: Request) -> Response {
        self.handle_append(id, req)
            .await
            .unwrap_or_else(error_response)
    }

    /// GET: stream the bytes stored so far.
    pub async fn download(&self, id: &str) -> Response {
        self.handle_download(id).await.unwrap_or_else(error_response)
    }

    /// DELETE: terminate an upload and discard its bytes.
    pub async fn terminate(&self, headers: &HeaderMap, id: &str) -> Response {
        self.handle_terminate(headers, id)
            .await
            .unwrap_or_else(error_response)
    }

    /// OPTIONS: advertise the protocol version and extensions.
    pub fn capabilities(&self) -> Response {
        let mut response = tus_response(StatusCode::NO_CONTENT);
        let map = response.headers_mut();
        map.insert(headers::TUS_VERSION, HeaderValue::from_static(TUS_VERSION));
        map.insert(
            headers::TUS_EXTENSION,
            HeaderValue::from_static(TUS_EXTENSIONS),
        );
        if let Some(max) = self.config.max_size {
            map.insert(headers::TUS_MAX_SIZE, HeaderValue::from(max));
        }
        response
    }

    async fn handle_create(&self, req: Request) -> Result<Response> {
        let (parts, body) = req.into_parts();
        check_version(&parts.headers)?;

        let size = header_str(&parts.headers, headers::UPLOAD_LENGTH.as_str())
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or(TusError::InvalidUploadLength)?;
        if let Some(max) = self.config.max_size {
            if size > max {
                return Err(TusError::MaxSizeExceeded { max });
            }
        }

        let mut desc = UploadDescriptor::new(size);
        if let Some(value) = header_str(&parts.headers, headers::UPLOAD_METADATA.as_str()) {
            desc.metadata = metadata::parse(value);
        }

        // Creation-with-upload: a body is only consumed when it is declared
        // as protocol content, anything else is ignored.
        let has_chunk = header_str(&parts.headers, header::CONTENT_TYPE.as_str())
            == Some(OFFSET_OCTET_STREAM);
        if has_chunk {
            if let Some(length) = content_length(&parts.headers) {
                if length > size {
                    return Err(TusError::SizeExceeded);
                }
            }
        }

        let upload = self.store.create(desc).await?;
        let mut offset = 0;
        if has_chunk {
            offset = self
                .store
                .write_chunk(&upload.id, 0, body_stream(body))
                .await?;
        }
        if offset == upload.size {
            self.store.finalize(&upload.id).await?;
        }
        info!(id = %upload.id, size = upload.size, offset, "upload created");

        let ctx = ForwardedContext::from_request(
            &parts.headers,
            &parts.uri,
            false,
            self.config.respect_forwarded_headers,
        );
        let location = absolute_url(&ctx, parts.uri.path(), &upload.id);

        let mut response = tus_response(StatusCode::CREATED);
        let map = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&location) {
            map.insert(header::LOCATION, value);
        }
        map.insert(headers::UPLOAD_OFFSET, HeaderValue::from(offset));
        Ok(response)
    }

    async fn handle_status(&self, request_headers: &HeaderMap, id: &str) -> Result<Response> {
        check_version(request_headers)?;
        let upload = self.store.info(id).await?;

        let mut response = tus_response(StatusCode::OK);
        let map = response.headers_mut();
        map.insert(headers::UPLOAD_OFFSET, HeaderValue::from(upload.offset));
        map.insert(headers::UPLOAD_LENGTH, HeaderValue::from(upload.size));
        map.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if !upload.metadata.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&metadata::serialize(&upload.metadata)) {
                map.insert(headers::UPLOAD_METADATA, value);
            }
        }
        Ok(response)
    }

    async fn handle_append(&self, id: &str, req: Request) -> Result<Response> {
        let (parts, body) = req.into_parts();
        check_version(&parts.headers)?;

        if header_str(&parts.headers, header::CONTENT_TYPE.as_str()) != Some(OFFSET_OCTET_STREAM)
        {
            return Err(TusError::InvalidContentType);
        }
        let offset = header_str(&parts.headers, headers::UPLOAD_OFFSET.as_str())
            .and_then(|value| value.parse::<u64>().ok())
            .ok_or(TusError::InvalidOffset)?;

        let _guard = self.locks.try_acquire(id)?;
        let upload = self.store.info(id).await?;

        if upload.is_final {
            // A retry of the last chunk after the response was lost gets an
            // idempotent acknowledgement instead of an error.
            if upload.is_complete() && offset == upload.offset {
                let mut response = tus_response(StatusCode::NO_CONTENT);
                response
                    .headers_mut()
                    .insert(headers::UPLOAD_OFFSET, HeaderValue::from(upload.offset));
                return Ok(response);
            }
            return Err(TusError::UploadFinal);
        }
        if offset != upload.offset {
            return Err(TusError::OffsetMismatch {
                expected: upload.offset,
                actual: offset,
            });
        }
        if let Some(length) = content_length(&parts.headers) {
            if offset + length > upload.size {
                return Err(TusError::SizeExceeded);
            }
        }

        let written = self
            .store
            .write_chunk(id, offset, body_stream(body))
            .await?;
        let new_offset = offset + written;
        if new_offset == upload.size {
            self.store.finalize(id).await?;
            info!(id, size = upload.size, "upload completed");
        } else {
            debug!(id, offset = new_offset, written, "chunk appended");
        }

        let mut response = tus_response(StatusCode::NO_CONTENT);
        response
            .headers_mut()
            .insert(headers::UPLOAD_OFFSET, HeaderValue::from(new_offset));
        Ok(response)
    }

    async fn handle_download(&self, id: &str) -> Result<Response> {
        let upload = self.store.info(id).await?;

        // Nothing uploaded yet: nothing to serve.
        if upload.offset == 0 {
            return Ok(tus_response(StatusCode::NO_CONTENT));
        }

        let content_type = match upload.metadata.get("filetype") {
            Some(filetype) if filetype.parse::<mime::Mime>().is_ok() => filetype.clone(),
            _ => "application/octet-stream".to_string(),
        };
        let mut disposition = String::from("attachment");
        if let Some(filename) = upload.metadata.get("filename") {
            disposition.push_str(&format!(";filename={filename:?}"));
        }

        let stream = self.store.read(id).await?;
        let mut response = tus_response(StatusCode::OK);
        *response.body_mut() = Body::from_stream(stream);
        let map = response.headers_mut();
        map.insert(header::CONTENT_LENGTH, HeaderValue::from(upload.offset));
        if let Ok(value) = HeaderValue::from_str(&content_type) {
            map.insert(header::CONTENT_TYPE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            map.insert(header::CONTENT_DISPOSITION, value);
        }
        Ok(response)
    }

    async fn handle_terminate(&self, request_headers: &HeaderMap, id: &str) -> Result<Response> {
        check_version(request_headers)?;
        let _guard = self.locks.try_acquire(id)?;
        self.store.delete(id).await?;
        info!(id, "upload terminated");
        Ok(tus_response(StatusCode::NO_CONTENT))
    }
}

/// Demand exactly the protocol version we implement.
fn check_version(request_headers: &HeaderMap) -> Result<()> {
    match header_str(request_headers, headers::TUS_RESUMABLE.as_str()) {
        Some(TUS_VERSION) => Ok(()),
        Some(other) => Err(TusError::UnsupportedVersion(other.to_string())),
        None => Err(TusError::UnsupportedVersion(String::new())),
    }
}

fn header_str<'a>(request_headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    request_headers.get(name).and_then(|value| value.to_str().ok())
}

fn content_length(request_headers: &HeaderMap) -> Option<u64> {
    header_str(request_headers, header::CONTENT_LENGTH.as_str())
        .and_then(|value| value.parse::<u64>().ok())
}

fn body_stream(body: Body) -> ByteStream {
    Box::pin(
        body.into_data_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other)),
    )
}

fn tus_response(status: StatusCode) -> Response {
    let mut response = status.into_response();
    response
        .headers_mut()
        .insert(headers::TUS_RESUMABLE, HeaderValue::from_static(TUS_VERSION));
    response
}

fn error_response(err: TusError) -> Response {
    let status = err.status_code();
    let mut response = (status, format!("{err}\n")).into_response();
    let map = response.headers_mut();
    map.insert(headers::TUS_RESUMABLE, HeaderValue::from_static(TUS_VERSION));
    if status == StatusCode::PRECONDITION_FAILED {
        map.insert(headers::TUS_VERSION, HeaderValue::from_static(TUS_VERSION));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Method;
    use media_store::MemoryStore;

    fn handler() -> (TusHandler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let handler = TusHandler::new(store.clone(), TusConfig::default());
        (handler, store)
    }

    fn create_request(length: &str, body: impl Into<Body>) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri("/media/")
            .header("host", "example.com")
            .header("tus-resumable", "1.0.0")
            .header("upload-length", length)
            .body(body.into())
            .unwrap()
    }

    fn patch_request(offset: &str, body: &'static [u8]) -> Request {
        Request::builder()
            .method(Method::PATCH)
            .uri("/media/x")
            .header("tus-resumable", "1.0.0")
            .header("content-type", OFFSET_OCTET_STREAM)
            .header("upload-offset", offset)
            .header("content-length", body.len().to_string())
            .body(Body::from(body))
            .unwrap()
    }

    fn location_id(response: &Response) -> String {
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        location.rsplit('/').next().unwrap().to_string()
    }

    fn tus_headers() -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(headers::TUS_RESUMABLE, HeaderValue::from_static("1.0.0"));
        map
    }

    #[tokio::test]
    async fn test_create_without_version_rejected() {
        let (handler, _) = handler();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/media/")
            .header("upload-length", "5")
            .body(Body::empty())
            .unwrap();

        let response = handler.create(req).await;
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(
            response.headers().get(headers::TUS_VERSION).unwrap(),
            "1.0.0"
        );
    }

    #[tokio::test]
    async fn test_create_requires_upload_length() {
        let (handler, _) = handler();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/media/")
            .header("tus-resumable", "1.0.0")
            .body(Body::empty())
            .unwrap();

        let response = handler.create(req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_builds_absolute_location() {
        let (handler, _) = handler();
        let response = handler.create(create_request("5", Body::empty())).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.starts_with("http://example.com/media/"));
        assert_eq!(response.headers().get(headers::UPLOAD_OFFSET).unwrap(), "0");
    }

    #[tokio::test]
    async fn test_create_decodes_metadata() {
        let (handler, store) = handler();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/media/")
            .header("host", "example.com")
            .header("tus-resumable", "1.0.0")
            .header("upload-length", "5")
            .header("upload-metadata", "filename aGVsbG8udHh0")
            .body(Body::empty())
            .unwrap();

        let response = handler.create(req).await;
        let id = location_id(&response);
        let info = store.info(&id).await.unwrap();
        assert_eq!(info.metadata.get("filename").map(String::as_str), Some("hello.txt"));
    }

    #[tokio::test]
    async fn test_create_with_upload_finalizes_complete_body() {
        let (handler, store) = handler();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/media/")
            .header("host", "example.com")
            .header("tus-resumable", "1.0.0")
            .header("upload-length", "5")
            .header("content-type", OFFSET_OCTET_STREAM)
            .header("content-length", "5")
            .body(Body::from("hello"))
            .unwrap();

        let response = handler.create(req).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get(headers::UPLOAD_OFFSET).unwrap(), "5");

        let info = store.info(&location_id(&response)).await.unwrap();
        assert!(info.is_final);
        assert_eq!(info.offset, 5);
    }

    #[tokio::test]
    async fn test_create_rejects_length_above_max() {
        let store = Arc::new(MemoryStore::new());
        let handler = TusHandler::new(
            store,
            TusConfig {
                max_size: Some(10),
                respect_forwarded_headers: true,
            },
        );

        let response = handler.create(create_request("11", Body::empty())).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_append_full_flow() {
        let (handler, _) = handler();
        let response = handler.create(create_request("10", Body::empty())).await;
        let id = location_id(&response);

        let response = handler.append(&id, patch_request("0", b"hello")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(headers::UPLOAD_OFFSET).unwrap(), "5");

        let response = handler.append(&id, patch_request("5", b"world")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(headers::UPLOAD_OFFSET).unwrap(), "10");

        let response = handler.status(&tus_headers(), &id).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(headers::UPLOAD_OFFSET).unwrap(), "10");
        assert_eq!(response.headers().get(headers::UPLOAD_LENGTH).unwrap(), "10");
    }

    #[tokio::test]
    async fn test_append_rejects_wrong_content_type() {
        let (handler, _) = handler();
        let response = handler.create(create_request("5", Body::empty())).await;
        let id = location_id(&response);

        let req = Request::builder()
            .method(Method::PATCH)
            .uri("/media/x")
            .header("tus-resumable", "1.0.0")
            .header("content-type", "text/plain")
            .header("upload-offset", "0")
            .body(Body::from("hello"))
            .unwrap();
        let response = handler.append(&id, req).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_append_offset_mismatch_conflicts() {
        let (handler, _) = handler();
        let response = handler.create(create_request("10", Body::empty())).await;
        let id = location_id(&response);

        let response = handler.append(&id, patch_request("3", b"abc")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_append_unknown_upload() {
        let (handler, _) = handler();
        let response = handler.append("missing", patch_request("0", b"abc")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_append_body_past_declared_length() {
        let (handler, _) = handler();
        let response = handler.create(create_request("3", Body::empty())).await;
        let id = location_id(&response);

        let response = handler.append(&id, patch_request("0", b"too long")).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_append_retry_of_final_chunk_is_acknowledged() {
        let (handler, _) = handler();
        let response = handler.create(create_request("5", Body::empty())).await;
        let id = location_id(&response);

        let response = handler.append(&id, patch_request("0", b"hello")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // Same PATCH again, as a client that lost the response would send it.
        let response = handler.append(&id, patch_request("5", b"")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(headers::UPLOAD_OFFSET).unwrap(), "5");
    }

    #[tokio::test]
    async fn test_append_rejects_incomplete_final_upload() {
        let (handler, store) = handler();
        let info = store
            .create(UploadDescriptor::new(10).with_final())
            .await
            .unwrap();

        let response = handler.append(&info.id, patch_request("0", b"hello")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_status_unknown_upload() {
        let (handler, _) = handler();
        let response = handler.status(&tus_headers(), "missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_serves_stored_bytes() {
        let (handler, _) = handler();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/media/")
            .header("host", "example.com")
            .header("tus-resumable", "1.0.0")
            .header("upload-length", "5")
            .header("upload-metadata", "filename aGVsbG8udHh0, filetype dGV4dC9wbGFpbg==")
            .header("content-type", OFFSET_OCTET_STREAM)
            .header("content-length", "5")
            .body(Body::from("hello"))
            .unwrap();
        let response = handler.create(req).await;
        let id = location_id(&response);

        let response = handler.download(&id).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment;filename=\"hello.txt\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_download_empty_upload() {
        let (handler, _) = handler();
        let response = handler.create(create_request("5", Body::empty())).await;
        let id = location_id(&response);

        let response = handler.download(&id).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_terminate_removes_upload() {
        let (handler, store) = handler();
        let response = handler.create(create_request("5", Body::empty())).await;
        let id = location_id(&response);

        let response = handler.terminate(&tus_headers(), &id).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.is_empty());

        let response = handler.status(&tus_headers(), &id).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_capabilities() {
        let store = Arc::new(MemoryStore::new());
        let handler = TusHandler::new(
            store,
            TusConfig {
                max_size: Some(1024),
                respect_forwarded_headers: true,
            },
        );

        let response = handler.capabilities();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(headers::TUS_VERSION).unwrap(), "1.0.0");
        assert_eq!(
            response.headers().get(headers::TUS_EXTENSION).unwrap(),
            TUS_EXTENSIONS
        );
        assert_eq!(response.headers().get(headers::TUS_MAX_SIZE).unwrap(), "1024");
    }
}
