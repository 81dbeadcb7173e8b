//! Shared error types for the services crate.

use thiserror::Error;

use storage::auth::AuthError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressStore`.
///
/// Remote and cache failures never appear here: the store logs and
/// recovers from them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressStoreError {
    #[error("progress has not been loaded for a signed-in user")]
    NotLoaded,
}

/// Errors raised while processing a progress calculation request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressFunctionError {
    #[error("User progress not found")]
    NotFound,
    #[error("invalid request body: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AuthSession`; always surfaced to the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthSessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{name} must not be empty")]
    Empty { name: &'static str },
    #[error("{name} must be a valid port number, got {raw:?}")]
    InvalidPort { name: &'static str, raw: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
