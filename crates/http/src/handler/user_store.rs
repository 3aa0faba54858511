use std::collections::HashMap;
use std::error::Error;

use parking_lot::RwLock;
use thiserror::Error;

/// Credential backend consulted for login and registration forms.
///
/// Implementations may block: they are only ever called from worker threads.
#[cfg_attr(test, mockall::automock)]
pub trait UserStore: Send + Sync {
    /// With `is_login`, checks that `username` exists with `password`. Otherwise registers
    /// `username` if it is still free. Returns whether the operation succeeded.
    ///
    /// Both values are the decoded form bytes, which need not be UTF-8.
    fn verify(&self, username: &[u8], password: &[u8], is_login: bool) -> Result<bool, StoreError>;
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("user store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("user store error: {source}")]
    Backend {
        #[from]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StoreError {
    pub fn unavailable<S: ToString>(str: S) -> Self {
        Self::Unavailable { reason: str.to_string() }
    }
}

/// In-memory user table.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users<I, K, V>(users: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let users = users.into_iter().map(|(name, password)| (name.into(), password.into())).collect();
        Self { users: RwLock::new(users) }
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl UserStore for MemoryUserStore {
    fn verify(&self, username: &[u8], password: &[u8], is_login: bool) -> Result<bool, StoreError> {
        if username.is_empty() || password.is_empty() {
            return Ok(false);
        }

        if is_login {
            return Ok(self.users.read().get(username).is_some_and(|stored| stored == password));
        }

        let mut users = self.users.write();
        if users.contains_key(username) {
            return Ok(false);
        }
        users.insert(username.to_vec(), password.to_vec());
        Ok(true)
    }
}

/// Adapts a closure into a [`UserStore`].
#[derive(Debug)]
pub struct UserStoreFn<F> {
    f: F,
}

impl<F> UserStore for UserStoreFn<F>
where
    F: Fn(&[u8], &[u8], bool) -> Result<bool, StoreError> + Send + Sync,
{
    fn verify(&self, username: &[u8], password: &[u8], is_login: bool) -> Result<bool, StoreError> {
        (self.f)(username, password, is_login)
    }
}

pub fn make_user_store<F>(f: F) -> UserStoreFn<F>
where
    F: Fn(&[u8], &[u8], bool) -> Result<bool, StoreError> + Send + Sync,
{
    UserStoreFn { f }
}
