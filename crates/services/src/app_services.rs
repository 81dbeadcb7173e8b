use std::sync::Arc;

use storage::repository::{InMemoryCache, LocalCache, Storage};
use storage::sqlite::SqliteRepository;
use tracing::debug;

use crate::Clock;
use crate::auth_session::AuthSession;
use crate::config::AppConfig;
use crate::error::AppServicesError;
use crate::progress_function::ProgressFunction;
use crate::progress_store::ProgressStore;

/// Assembles the server function and the client-side holders over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress_function: Arc<ProgressFunction>,
    auth_session: Arc<AuthSession>,
    progress_store: Arc<ProgressStore>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// The remote store and auth service share `config.db_url`; the local
    /// cache lives in its own database at `config.cache_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if either database cannot be opened or migrated.
    pub async fn new_sqlite(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url, clock).await?;
        let cache = SqliteRepository::connect(&config.cache_url)
            .await?
            .with_clock(clock);
        cache.migrate_cache().await?;
        debug!(db_url = %config.db_url, cache_url = %config.cache_url, "sqlite storage ready");
        Ok(Self::from_parts(storage, Arc::new(cache), clock))
    }

    /// Build services over in-memory adapters.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_parts(Storage::in_memory(), Arc::new(InMemoryCache::new()), clock)
    }

    #[must_use]
    pub fn from_parts(storage: Storage, cache: Arc<dyn LocalCache>, clock: Clock) -> Self {
        let progress_function = Arc::new(ProgressFunction::new(Arc::clone(&storage.progress)));
        let auth_session = Arc::new(AuthSession::new(
            clock,
            Arc::clone(&storage.auth),
            Arc::clone(&storage.profiles),
        ));
        let progress_store = Arc::new(ProgressStore::new(Arc::clone(&storage.progress), cache));

        Self {
            progress_function,
            auth_session,
            progress_store,
        }
    }

    #[must_use]
    pub fn progress_function(&self) -> Arc<ProgressFunction> {
        Arc::clone(&self.progress_function)
    }

    #[must_use]
    pub fn auth_session(&self) -> Arc<AuthSession> {
        Arc::clone(&self.auth_session)
    }

    #[must_use]
    pub fn progress_store(&self) -> Arc<ProgressStore> {
        Arc::clone(&self.progress_store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::time::fixed_clock;

    #[test]
    fn services_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppServices>();
        assert_send_sync::<ProgressStore>();
        assert_send_sync::<AuthSession>();
    }

    #[tokio::test]
    async fn in_memory_services_share_one_remote_store() {
        let services = AppServices::in_memory(fixed_clock());
        let user = services
            .auth_session()
            .register("ada@example.com", "analytical", "Ada")
            .await
            .unwrap();

        services.progress_store().load(&user.id).await;

        let body = serde_json::json!({
            "userId": user.id.as_str(),
            "type": "challenge",
            "itemId": "c-1",
        })
        .to_string();
        let response = services.progress_function().handle(&body).await;
        assert_eq!(response.status, 200);
    }
}
