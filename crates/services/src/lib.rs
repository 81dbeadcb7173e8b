#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth_session;
pub mod config;
pub mod error;
pub mod progress_function;
pub mod progress_store;

pub use progress_core::Clock;

pub use app_services::AppServices;
pub use auth_session::AuthSession;
pub use config::AppConfig;
pub use error::{
    AppServicesError, AuthSessionError, ConfigError, ProgressFunctionError, ProgressStoreError,
};
pub use progress_function::{
    FunctionBody, FunctionResponse, ProgressFunction, ProgressUpdateRequest, ProgressUpdateSummary,
};
pub use progress_store::{LoadState, ProgressStore};
