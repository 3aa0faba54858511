//! Response-side protocol tables and the result of building a response.
//!
//! The response head is represented as `http::Response<()>` and serialized by the
//! [`HeaderEncoder`](crate::codec::HeaderEncoder); the body travels next to it as a [`Payload`].

use http::{Response, StatusCode};

use crate::protocol::Payload;

/// The header portion of a response, before the body is attached.
pub type ResponseHead = Response<()>;

/// Status codes this server emits, with their reason phrases.
const CODE_STATUS: [(StatusCode, &str); 4] = [
    (StatusCode::OK, "OK"),
    (StatusCode::BAD_REQUEST, "Bad Request"),
    (StatusCode::FORBIDDEN, "Forbidden"),
    (StatusCode::NOT_FOUND, "Not Found"),
];

/// File suffix to content type.
const SUFFIX_TYPE: [(&str, &str); 21] = [
    (".html", "text/html"),
    (".xml", "text/xml"),
    (".xhtml", "application/xhtml+xml"),
    (".txt", "text/plain"),
    (".rtf", "application/rtf"),
    (".pdf", "application/pdf"),
    (".word", "application/nsword"),
    (".png", "image/png"),
    (".gif", "image/gif"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".au", "audio/basic"),
    (".mpeg", "video/mpeg"),
    (".mpg", "video/mpeg"),
    (".avi", "video/x-msvideo"),
    (".gz", "application/x-gzip"),
    (".tar", "application/x-tar"),
    (".css", "text/css"),
    (".js", "text/javascript"),
    (".svg", "image/svg+xml"),
    (".ico", "image/x-icon"),
];

const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Reason phrase for a status this server knows, `None` otherwise.
pub fn reason_phrase(status: StatusCode) -> Option<&'static str> {
    CODE_STATUS.iter().find(|(code, _)| *code == status).map(|(_, reason)| *reason)
}

/// Content type derived from the suffix after the last `.` of `path`.
///
/// Paths without a suffix, or with an unknown one, are served as `text/plain`.
pub fn content_type(path: &str) -> &'static str {
    let Some(dot) = path.rfind('.') else {
        return DEFAULT_CONTENT_TYPE;
    };
    let suffix = &path[dot..];
    SUFFIX_TYPE
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(suffix))
        .map_or(DEFAULT_CONTENT_TYPE, |(_, content_type)| *content_type)
}

/// What a worker produced for one request.
///
/// The head has already been serialized into the connection's write buffer; the reply carries
/// the body and the facts the connection needs once the send completes.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub keep_alive: bool,
    pub payload: Payload,
}
