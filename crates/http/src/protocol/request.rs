//! A fully parsed HTTP request.
//!
//! Unlike a streaming request, a [`Request`] owns its complete body: the parser only yields it
//! once `Content-Length` bytes have been buffered. Url-encoded form bodies are decoded eagerly
//! into [`FormData`].

use bytes::Bytes;
use http::header::{CONNECTION, CONTENT_TYPE};
use http::{HeaderMap, Method, Version};
use mime::Mime;

use crate::protocol::FormData;

#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) version: Version,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) form: FormData,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: String::new(),
            query: None,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            form: FormData::new(),
        }
    }
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The normalized request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path<S: Into<String>>(&mut self, path: S) {
        self.path = path.into();
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn form(&self) -> &FormData {
        &self.form
    }

    /// Whether the peer asked to keep the connection open.
    ///
    /// Only HTTP/1.1 requests carrying `Connection: keep-alive` qualify; the header value is
    /// compared case-insensitively.
    pub fn keep_alive(&self) -> bool {
        self.version == Version::HTTP_11
            && self.headers.get(CONNECTION).is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"keep-alive"))
    }

    pub fn content_type(&self) -> Option<Mime> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()
    }

    /// Whether this is a POST carrying an url-encoded form.
    pub fn is_form_post(&self) -> bool {
        self.method == Method::POST
            && self
                .content_type()
                .is_some_and(|mime| mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED)
    }
}
