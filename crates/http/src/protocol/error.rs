use std::io;
use thiserror::Error;

use crate::codec::ParseState;

/// Any failure while serving one connection.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("bad request: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("failed to send response: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("socket error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Why a request was rejected; every variant is answered with 400 Bad Request.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("request head of {current_size} bytes exceeds the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("more than {max_num} header fields")]
    TooManyHeaders { max_num: usize },

    #[error("invalid request line: {reason}")]
    InvalidRequestLine { reason: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(String),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("unsupported transfer-encoding")]
    UnsupportedTransferEncoding,

    #[error("body of {current_size} bytes exceeds the limit {max_size}")]
    TooLargeBody { current_size: u64, max_size: u64 },

    #[error("invalid form body: {reason}")]
    InvalidForm { reason: String },

    #[error("parser already finished in state {0:?}, reset it before reuse")]
    Terminated(ParseState),
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_request_line<S: ToString>(str: S) -> Self {
        Self::InvalidRequestLine { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_form<S: ToString>(str: S) -> Self {
        Self::InvalidForm { reason: str.to_string() }
    }

    pub fn too_large_body(current_size: u64, max_size: u64) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }
}

/// Failure while writing a response to the socket.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("write failed: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
