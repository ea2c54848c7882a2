//! Re-sendable request snapshots.
//!
//! A body is consumed by sending it, so a sender that may issue the same
//! request more than once captures it first and rebuilds a fresh
//! `Request<Body>` for each attempt.

use axum::body::Bytes;
use axum::http::{Extensions, HeaderMap, Method, Request, Uri, Version};
use hyper::body::Body as HttpBody;

use crate::error::SendError;
use crate::Body;

/// Default cap on buffered request bodies (2 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// A request whose body has been buffered so it can be sent repeatedly.
#[derive(Debug, Clone)]
pub struct ReplayableRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    extensions: Extensions,
    body: Bytes,
}

impl ReplayableRequest {
    /// Buffer `request`, failing if its body exceeds `max_body_bytes`.
    pub async fn capture(request: Request<Body>, max_body_bytes: usize) -> Result<Self, SendError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, max_body_bytes)
            .await
            .map_err(|e| SendError::InvalidRequest(format!("request body not replayable: {e}")))?;

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            extensions: parts.extensions,
            body,
        })
    }

    /// Build a fresh request for the next attempt.
    pub fn request(&self) -> Request<Body> {
        let mut request = Request::new(Body::from(self.body.clone()));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        *request.extensions_mut() = self.extensions.clone();
        request
    }

    /// Whether `request` advertises a body no larger than `max_body_bytes`.
    ///
    /// Bodies without an upper size bound (streams) are never captured.
    pub fn can_capture(request: &Request<Body>, max_body_bytes: usize) -> bool {
        HttpBody::size_hint(request.body())
            .upper()
            .is_some_and(|upper| upper <= max_body_bytes as u64)
    }
}
