use std::sync::Arc;

use http::StatusCode;
use tracing::{error, info, warn};

use crate::buffer::Buffer;
use crate::codec::ResponseBuilder;
use crate::handler::UserStore;
use crate::protocol::{ParseError, Reply, Request};

pub const LOGIN_PAGE: &str = "/login.html";
pub const REGISTER_PAGE: &str = "/register.html";
pub const WELCOME_PAGE: &str = "/welcome.html";
pub const ERROR_PAGE: &str = "/error.html";

/// Produces the [`Reply`] for one parse outcome.
///
/// Shared by every worker, so it holds nothing mutable of its own.
pub struct RequestHandler {
    builder: ResponseBuilder,
    user_store: Arc<dyn UserStore>,
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler").field("builder", &self.builder).finish_non_exhaustive()
    }
}

impl RequestHandler {
    pub fn new(builder: ResponseBuilder, user_store: Arc<dyn UserStore>) -> Self {
        Self { builder, user_store }
    }

    /// Writes the response head into `dst` and returns the reply.
    ///
    /// A parse failure is answered with 400 and never keeps the connection alive.
    pub fn handle(&self, parsed: Result<Request, ParseError>, dst: &mut Buffer) -> Reply {
        match parsed {
            Ok(mut request) => {
                self.authorize(&mut request);
                info!(method = %request.method(), path = request.path(), "handle request");
                self.builder.build(request.path(), request.keep_alive(), None, dst)
            }
            Err(e) => {
                warn!(cause = %e, "bad request");
                self.builder.build("", false, Some(StatusCode::BAD_REQUEST), dst)
            }
        }
    }

    /// Rewrites login and register form posts to the welcome or error page.
    fn authorize(&self, request: &mut Request) {
        let is_login = match request.path() {
            LOGIN_PAGE => true,
            REGISTER_PAGE => false,
            _ => return,
        };
        if !request.is_form_post() {
            return;
        }

        let username = request.form().get("username").unwrap_or_default();
        let password = request.form().get("password").unwrap_or_default();
        let name = String::from_utf8_lossy(username);

        let verified = match self.user_store.verify(username, password, is_login) {
            Ok(verified) => verified,
            Err(e) => {
                error!(cause = %e, "user store failed, treat as unverified");
                false
            }
        };
        info!(username = %name, is_login, verified, "verify user");

        request.set_path(if verified { WELCOME_PAGE } else { ERROR_PAGE });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{default_error_pages, RequestParser};
    use crate::handler::{MockUserStore, StoreError};
    use crate::static_files::StaticRoot;
    use bytes::Buf;
    use indoc::formatdoc;
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in [
            ("index.html", "index"),
            ("login.html", "login"),
            ("welcome.html", "welcome"),
            ("error.html", "error"),
            ("400.html", "bad request"),
        ] {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    fn handler_with(dir: &TempDir, store: MockUserStore) -> RequestHandler {
        let builder = ResponseBuilder::new(StaticRoot::new(dir.path()), default_error_pages());
        RequestHandler::new(builder, Arc::new(store))
    }

    fn parse(raw: &[u8]) -> Result<Request, ParseError> {
        let mut buffer = Buffer::new();
        buffer.append(raw);
        RequestParser::new().parse(&mut buffer).map(Option::unwrap)
    }

    fn login_form(path: &str, body: &str) -> Vec<u8> {
        formatdoc! {"
            POST {path} HTTP/1.1\r
            Content-Type: application/x-www-form-urlencoded\r
            Content-Length: {}\r
            \r
            {body}",
            body.len()
        }
        .into_bytes()
    }

    #[test]
    fn successful_login_goes_to_welcome() {
        let dir = site();
        let mut store = MockUserStore::new();
        store
            .expect_verify()
            .with(eq(&b"alice"[..]), eq(&b"secret"[..]), eq(true))
            .times(1)
            .returning(|_, _, _| Ok(true));
        let handler = handler_with(&dir, store);

        let mut dst = Buffer::new();
        let reply = handler.handle(parse(&login_form("/login", "username=alice&password=secret")), &mut dst);

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.payload.chunk(), b"welcome");
    }

    #[test]
    fn failed_registration_goes_to_error() {
        let dir = site();
        let mut store = MockUserStore::new();
        store
            .expect_verify()
            .with(eq(&b"alice"[..]), eq(&b"secret"[..]), eq(false))
            .times(1)
            .returning(|_, _, _| Ok(false));
        let handler = handler_with(&dir, store);

        let mut dst = Buffer::new();
        let reply = handler.handle(parse(&login_form("/register.html", "username=alice&password=secret")), &mut dst);

        assert_eq!(reply.payload.chunk(), b"error");
    }

    #[test]
    fn latin1_password_reaches_store_unchanged() {
        let dir = site();
        let mut store = MockUserStore::new();
        store
            .expect_verify()
            .with(eq(&b"j\xF6rg"[..]), eq(&b"p\xE4ss"[..]), eq(true))
            .times(1)
            .returning(|_, _, _| Ok(true));
        let handler = handler_with(&dir, store);

        let mut dst = Buffer::new();
        let reply = handler.handle(parse(&login_form("/login", "username=j%F6rg&password=p%E4ss")), &mut dst);

        assert_eq!(reply.payload.chunk(), b"welcome");
    }

    #[test]
    fn store_error_counts_as_failure() {
        let dir = site();
        let mut store = MockUserStore::new();
        store.expect_verify().times(1).returning(|_, _, _| Err(StoreError::unavailable("down")));
        let handler = handler_with(&dir, store);

        let mut dst = Buffer::new();
        let reply = handler.handle(parse(&login_form("/login", "username=a&password=b")), &mut dst);

        assert_eq!(reply.payload.chunk(), b"error");
    }

    #[test]
    fn plain_get_of_login_page_skips_store() {
        let dir = site();
        let mut store = MockUserStore::new();
        store.expect_verify().never();
        let handler = handler_with(&dir, store);

        let mut dst = Buffer::new();
        let reply = handler.handle(parse(b"GET /login HTTP/1.1\r\n\r\n"), &mut dst);

        assert_eq!(reply.payload.chunk(), b"login");
    }

    #[test]
    fn parse_failure_is_bad_request_and_closes() {
        let dir = site();
        let handler = handler_with(&dir, MockUserStore::new());

        let mut dst = Buffer::new();
        let reply = handler.handle(parse(b"BROKEN\r\n\r\n"), &mut dst);

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(!reply.keep_alive);
        assert_eq!(reply.payload.chunk(), b"bad request");
        assert!(String::from_utf8(dst.retrieve_all_to_vec()).unwrap().contains("connection: close\r\n"));
    }
}
