//! Upload intake: mode arbitration and the unified response body
//!
//! `POST /media` accepts two upload styles. A request whose `Content-Type`
//! is exactly the binary-offset protocol type is a resumable create and its
//! body belongs to the protocol engine; anything else is decoded as a
//! browser form upload. Both paths end in the same response shape, a JSON
//! array of [`MediaLink`] entries.

use axum::extract::multipart::Field;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::{Bytes, BytesMut};
use media_store::{ByteStream, UploadDescriptor, UploadStore};
use media_tus::{absolute_url, ForwardedContext, OFFSET_OCTET_STREAM};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::error::ApiError;
use crate::state::AppState;

/// One uploaded file in the unified response body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaLink {
    /// Storage id, omitted when it cannot be derived from the upload URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Client-supplied file name, empty for resumable creates
    pub filename: String,
    /// Absolute URL the stored file is served from
    pub url: String,
}

/// How an incoming `POST /media` body is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadMode {
    /// Resumable-protocol create, body is raw protocol content
    Resumable,
    /// Form upload carrying one or more file parts
    Multipart,
}

impl UploadMode {
    /// Select the upload mode for a request. Only an exact match on the
    /// binary-offset content type selects the resumable path; any other
    /// value, including a parameterized variant, is treated as form data.
    pub fn detect(request_headers: &HeaderMap) -> Self {
        let content_type = request_headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if content_type == OFFSET_OCTET_STREAM {
            UploadMode::Resumable
        } else {
            UploadMode::Multipart
        }
    }
}

/// POST /media: accept an upload in either mode.
pub async fn create_media(
    State(state): State<AppState>,
    req: Request,
) -> Result<Response, ApiError> {
    match UploadMode::detect(req.headers()) {
        UploadMode::Resumable => Ok(resumable_create(&state, req).await),
        UploadMode::Multipart => multipart_create(&state, req).await,
    }
}

/// Hand a resumable create to the protocol engine, then rewrap success into
/// the unified body. Failures, and creates without a `Location`, pass
/// through untouched.
async fn resumable_create(state: &AppState, req: Request) -> Response {
    let response = state.tus.create(req).await;
    if response.status() != StatusCode::CREATED {
        return response;
    }
    let Some(location) = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
    else {
        return response;
    };

    let link = MediaLink {
        id: extract_upload_id(&location).unwrap_or_default().to_owned(),
        filename: String::new(),
        url: location,
    };

    // Keep the protocol headers (Location, Tus-Resumable, Upload-Offset)
    // on the rewrapped response.
    let (parts, _) = response.into_parts();
    let mut unified = (StatusCode::CREATED, Json(vec![link])).into_response();
    for (name, value) in &parts.headers {
        if name != &header::CONTENT_TYPE && name != &header::CONTENT_LENGTH {
            unified.headers_mut().insert(name.clone(), value.clone());
        }
    }
    unified
}

/// Decode a form upload and persist each file part, in part order. The
/// first failure aborts the batch; uploads already stored are rolled back
/// so a failed request leaves nothing behind.
async fn multipart_create(state: &AppState, req: Request) -> Result<Response, ApiError> {
    let ctx = ForwardedContext::from_request(
        req.headers(),
        req.uri(),
        false,
        state.config.respect_forwarded_headers,
    );
    let path = req.uri().path().to_owned();
    let multipart = Multipart::from_request(req, &())
        .await
        .map_err(|err| ApiError::BadRequest(format!("invalid multipart payload: {err}")))?;

    let mut stored = Vec::new();
    match store_file_parts(state, multipart, &ctx, &path, &mut stored).await {
        Ok(links) => Ok((StatusCode::CREATED, Json(links)).into_response()),
        Err(err) => {
            rollback(state.store.as_ref(), &stored).await;
            Err(err)
        }
    }
}

/// Run every file part through the create/write/finalize sequence,
/// collecting one link per part. Ids of uploads that reached the store are
/// pushed to `stored` even when a later step fails.
async fn store_file_parts(
    state: &AppState,
    mut multipart: Multipart,
    ctx: &ForwardedContext,
    path: &str,
    stored: &mut Vec<String>,
) -> Result<Vec<MediaLink>, ApiError> {
    let mut links = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        // Parts without a filename are ordinary form values, not files.
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_owned);

        let part = SpooledPart::drain(field).await?;
        let mut desc = UploadDescriptor::new(part.len()).with_final();
        if let Some(filetype) = content_type {
            desc = desc.with_metadata("filetype", filetype);
        }

        let upload = state.store.create(desc).await?;
        stored.push(upload.id.clone());

        let written = state
            .store
            .write_chunk(&upload.id, 0, part.into_stream().await?)
            .await?;
        tracing::debug!(id = %upload.id, filename = %filename, written, "stored file part");
        state.store.finalize(&upload.id).await?;
        let info = state.store.info(&upload.id).await?;

        let url = absolute_url(ctx, path, &info.id);
        links.push(MediaLink {
            id: info.id,
            filename,
            url,
        });
    }

    Ok(links)
}

/// Bytes of a file part kept in memory before spilling to disk.
const SPOOL_MEMORY_LIMIT: usize = 32 * 1024 * 1024;

/// A file part read off the wire before its store upload exists.
///
/// Parts up to [`SPOOL_MEMORY_LIMIT`] stay in memory; anything larger spills
/// into an unnamed temporary file the OS reclaims when the handle drops, so
/// an aborted batch leaves no stray spill files behind.
enum SpooledPart {
    Memory(BytesMut),
    Disk(tokio::fs::File, u64),
}

impl SpooledPart {
    /// Consume a multipart field into a spooled part.
    async fn drain(mut field: Field<'_>) -> Result<Self, ApiError> {
        let mut part = SpooledPart::Memory(BytesMut::new());
        while let Some(chunk) = field.chunk().await? {
            part.push(chunk).await?;
        }
        Ok(part)
    }

    async fn push(&mut self, chunk: Bytes) -> Result<(), ApiError> {
        match self {
            SpooledPart::Memory(buf) if buf.len() + chunk.len() <= SPOOL_MEMORY_LIMIT => {
                buf.extend_from_slice(&chunk);
            }
            SpooledPart::Memory(buf) => {
                let buffered = std::mem::take(buf);
                let mut file = tokio::fs::File::from_std(tempfile::tempfile()?);
                file.write_all(&buffered).await?;
                file.write_all(&chunk).await?;
                *self = SpooledPart::Disk(file, (buffered.len() + chunk.len()) as u64);
            }
            SpooledPart::Disk(file, len) => {
                file.write_all(&chunk).await?;
                *len += chunk.len() as u64;
            }
        }
        Ok(())
    }

    fn len(&self) -> u64 {
        match self {
            SpooledPart::Memory(buf) => buf.len() as u64,
            SpooledPart::Disk(_, len) => *len,
        }
    }

    /// Replay the spooled bytes as a store-compatible stream.
    async fn into_stream(self) -> Result<ByteStream, ApiError> {
        match self {
            SpooledPart::Memory(buf) => {
                let data = buf.freeze();
                let stream = futures::stream::once(async move { Ok::<_, std::io::Error>(data) });
                Ok(Box::pin(stream))
            }
            SpooledPart::Disk(mut file, _) => {
                file.rewind().await?;
                Ok(Box::pin(ReaderStream::new(file)))
            }
        }
    }
}

/// Delete uploads stored before an aborted batch failed.
async fn rollback(store: &dyn UploadStore, stored: &[String]) {
    for id in stored {
        if let Err(err) = store.delete(id).await {
            tracing::warn!(id = %id, "failed to roll back upload: {err}");
        }
    }
}

/// Upload id of a `Location` URL: the last non-empty path segment, with or
/// without a trailing slash.
fn extract_upload_id(location: &str) -> Option<&str> {
    location.rsplit('/').find(|segment| !segment.is_empty())
}
