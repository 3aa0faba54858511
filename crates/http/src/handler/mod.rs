//! Per-request work executed on the worker pool.
//!
//! [`RequestHandler`] turns a parse outcome into a response: it runs the credential hook for
//! the login and register pages against a [`UserStore`], then lets the
//! [`ResponseBuilder`](crate::codec::ResponseBuilder) write the head and pick the body.

mod request_handler;
mod user_store;

pub use request_handler::{RequestHandler, ERROR_PAGE, LOGIN_PAGE, REGISTER_PAGE, WELCOME_PAGE};
pub use user_store::{make_user_store, MemoryUserStore, StoreError, UserStore, UserStoreFn};

#[cfg(test)]
pub use user_store::MockUserStore;
