use async_trait::async_trait;
use progress_core::model::{AuthUser, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::password::{MIN_PASSWORD_LEN, hash_password, is_strong_enough, verify_password};
use crate::repository::StorageError;

/// Errors surfaced by auth backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("an account with this email already exists")]
    AccountExists,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("no active session")]
    NoSession,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("password must be at least {} characters long", MIN_PASSWORD_LEN)]
    WeakPassword,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::Hashing(err.to_string())
    }
}

/// Session-based remote auth service.
///
/// A backend handle represents one client: it holds at most one current
/// session, which `current_user` and `delete_current_session` act on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Create an account. Does not open a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccountExists` for a taken email, validation errors
    /// for malformed input, or storage errors.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthUser, AuthError>;

    /// Open a session for the given credentials, replacing any current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password pair does not match.
    async fn create_session(&self, email: &str, password: &str) -> Result<(), AuthError>;

    /// Account behind the current session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoSession` when no session is open.
    async fn current_user(&self) -> Result<AuthUser, AuthError>;

    /// Close the current session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoSession` when no session is open.
    async fn delete_current_session(&self) -> Result<(), AuthError>;
}

/// Checks shared by every backend before an account is created.
///
/// # Errors
///
/// Returns `AuthError::InvalidEmail` or `AuthError::WeakPassword`.
pub fn validate_new_account(email: &str, password: &str) -> Result<(), AuthError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => return Err(AuthError::InvalidEmail),
    }
    if !is_strong_enough(password) {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
struct Account {
    user: AuthUser,
    password_hash: String,
}

/// In-memory auth backend for tests and offline use.
#[derive(Clone, Default)]
pub struct InMemoryAuth {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    session: Arc<Mutex<Option<UserId>>>,
}

impl InMemoryAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthBackend for InMemoryAuth {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthUser, AuthError> {
        validate_new_account(email, password)?;
        let email = normalize_email(email);
        let password_hash = hash_password(password)?;

        let mut guard = self
            .accounts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&email) {
            return Err(AuthError::AccountExists);
        }
        let user = AuthUser {
            id: UserId::unique(),
            email: email.clone(),
            name: name.trim().to_owned(),
        };
        guard.insert(
            email,
            Account {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let account = {
            let guard = self
                .accounts
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard
                .get(&normalize_email(email))
                .cloned()
                .ok_or(AuthError::InvalidCredentials)?
        };
        if !verify_password(password, &account.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        let mut session = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *session = Some(account.user.id);
        Ok(())
    }

    async fn current_user(&self) -> Result<AuthUser, AuthError> {
        let user_id = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?
            .clone()
            .ok_or(AuthError::NoSession)?;
        let guard = self
            .accounts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .values()
            .find(|account| account.user.id == user_id)
            .map(|account| account.user.clone())
            .ok_or(AuthError::NoSession)
    }

    async fn delete_current_session(&self) -> Result<(), AuthError> {
        let mut session = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        session.take().map(|_| ()).ok_or(AuthError::NoSession)
    }
}
