//! Builds the response for a request path.
//!
//! The builder resolves the path against the [`StaticRoot`], picks the status, swaps in the
//! configured error page for error statuses, serializes the head into the write buffer and
//! returns the body as a [`Payload`].

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, StatusCode};
use tracing::{debug, warn};

use crate::buffer::Buffer;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{content_type, reason_phrase, Payload, Reply, ResponseHead};
use crate::static_files::{FileStatus, StaticRoot};

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");
const KEEP_ALIVE_PARAMS: HeaderValue = HeaderValue::from_static("max=6, timeout=120");

/// Error statuses and the page served for each, relative to the document root.
pub fn default_error_pages() -> HashMap<StatusCode, String> {
    HashMap::from([
        (StatusCode::BAD_REQUEST, "/400.html".to_string()),
        (StatusCode::FORBIDDEN, "/403.html".to_string()),
        (StatusCode::NOT_FOUND, "/404.html".to_string()),
    ])
}

#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    root: StaticRoot,
    error_pages: HashMap<StatusCode, String>,
    header_encoder: HeaderEncoder,
}

impl ResponseBuilder {
    pub fn new(root: StaticRoot, error_pages: HashMap<StatusCode, String>) -> Self {
        Self { root, error_pages, header_encoder: HeaderEncoder }
    }

    pub fn root(&self) -> &StaticRoot {
        &self.root
    }

    /// Writes the response head for `path` into `dst` and returns the body.
    ///
    /// `status` is the tentative status chosen by the caller. Without one, the path is resolved
    /// against the document root and the status follows from the file found there. A caller
    /// supplied error status (such as 400 after a parse failure) is kept as is and only the
    /// error page is looked up.
    pub fn build(&self, path: &str, keep_alive: bool, status: Option<StatusCode>, dst: &mut Buffer) -> Reply {
        let mut status = match status {
            Some(status) if status.is_client_error() || status.is_server_error() => status,
            tentative => match self.root.stat(path) {
                FileStatus::Regular { .. } => tentative.unwrap_or(StatusCode::OK),
                FileStatus::Missing | FileStatus::NotRegular => StatusCode::NOT_FOUND,
                FileStatus::Unreadable | FileStatus::OutsideRoot => StatusCode::FORBIDDEN,
            },
        };
        if reason_phrase(status).is_none() {
            status = StatusCode::BAD_REQUEST;
        }

        let path = self.error_pages.get(&status).map_or(path, String::as_str);

        let payload = match self.root.stat(path) {
            FileStatus::Regular { .. } => self.root.open(path).unwrap_or_else(|e| {
                warn!(cause = %e, path, "failed to open file");
                error_body(status, "File NotFound!")
            }),
            other => {
                debug!(?other, path, "no file to send");
                error_body(status, "File NotFound!")
            }
        };

        let mut head = ResponseHead::new(());
        *head.status_mut() = status;
        let headers = head.headers_mut();
        if keep_alive {
            headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
            headers.insert(KEEP_ALIVE, KEEP_ALIVE_PARAMS);
        } else {
            headers.insert(CONNECTION, HeaderValue::from_static("close"));
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type(path)));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(payload.len()));

        self.header_encoder.encode(&head, dst);

        Reply { status, keep_alive, payload }
    }
}

/// Small inline HTML page used when no file can be sent.
fn error_body(status: StatusCode, message: &str) -> Payload {
    let reason = reason_phrase(status).unwrap_or("Bad Request");
    let body = format!(
        "<html><title>Error</title><body bgcolor=\"ffffff\">{} : {}\n<p>{}</p><hr><em>micro-httpd</em></body></html>",
        status.as_str(),
        reason,
        message
    );
    Payload::OwnedBytes(Bytes::from(body))
}
