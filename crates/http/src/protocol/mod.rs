//! Core HTTP protocol types.
//!
//! - **Requests**: [`Request`] is a fully parsed request, body included, with
//!   url-encoded forms decoded into [`FormData`].
//! - **Responses**: the [`ResponseHead`] alias, the status and content-type
//!   tables, and the [`Reply`] a worker hands back to the connection.
//! - **Payloads**: the body segment of a response, either owned bytes or a
//!   read-only file mapping sent without copying.
//! - **Errors**: [`HttpError`] on top of [`ParseError`] and [`SendError`].

mod form;
pub use form::FormData;

mod payload;
pub use payload::MappedRegion;
pub use payload::Payload;

mod request;
pub use request::Request;

mod response;
pub use response::content_type;
pub use response::reason_phrase;
pub use response::Reply;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
