use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use progress_core::Clock;
use progress_core::model::{AuthUser, UserProfile};
use storage::auth::{AuthBackend, AuthError};
use storage::repository::ProfileRepository;
use tracing::{debug, info, warn};

use crate::error::AuthSessionError;

#[derive(Debug, Default)]
struct SessionState {
    initialized: bool,
    user: Option<AuthUser>,
}

/// Holds the signed-in user for one client.
///
/// The user is fetched once by `init` and afterwards only changes through
/// `login`, `register` and `logout`; the backend is never polled.
pub struct AuthSession {
    clock: Clock,
    auth: Arc<dyn AuthBackend>,
    profiles: Arc<dyn ProfileRepository>,
    state: Mutex<SessionState>,
}

impl AuthSession {
    #[must_use]
    pub fn new(
        clock: Clock,
        auth: Arc<dyn AuthBackend>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            clock,
            auth,
            profiles,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True until `init` has checked for an existing session.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        !self.lock_state().initialized
    }

    #[must_use]
    pub fn current_user(&self) -> Option<AuthUser> {
        self.lock_state().user.clone()
    }

    /// Check once for an existing session and remember its user.
    ///
    /// A missing or unreadable session leaves the client signed out.
    pub async fn init(&self) -> Option<AuthUser> {
        let user = match self.auth.current_user().await {
            Ok(user) => Some(user),
            Err(AuthError::NoSession) => None,
            Err(err) => {
                warn!(error = %err, "could not check current session");
                None
            }
        };

        let mut state = self.lock_state();
        state.initialized = true;
        state.user.clone_from(&user);
        debug!(signed_in = user.is_some(), "auth session initialized");
        user
    }

    /// Open a session and remember its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthSessionError` if the credentials are rejected or the
    /// backend fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser, AuthSessionError> {
        self.auth.create_session(email, password).await?;
        let user = self.auth.current_user().await?;
        info!(user_id = %user.id, "signed in");

        let mut state = self.lock_state();
        state.initialized = true;
        state.user = Some(user.clone());
        Ok(user)
    }

    /// Create an account, sign in, then write its profile document.
    ///
    /// A failed profile write is logged and does not fail registration.
    ///
    /// # Errors
    ///
    /// Returns `AuthSessionError` if account creation or sign-in fails.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthUser, AuthSessionError> {
        let account = self.auth.create_account(email, password, name).await?;
        info!(user_id = %account.id, "account created");
        self.login(email, password).await?;

        let profile = UserProfile::for_user(&account, self.clock.now());
        if let Err(err) = self.profiles.create_profile(&profile).await {
            warn!(user_id = %account.id, error = %err, "could not create user profile");
        }
        Ok(account)
    }

    /// Close the current session and forget its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthSessionError` if the backend cannot close the session;
    /// the user stays signed in locally in that case.
    pub async fn logout(&self) -> Result<(), AuthSessionError> {
        self.auth.delete_current_session().await?;
        let previous = self.lock_state().user.take();
        if let Some(user) = previous {
            info!(user_id = %user.id, "signed out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use progress_core::model::{RecordId, UserId};
    use progress_core::time::{fixed_clock, fixed_now};
    use storage::auth::InMemoryAuth;
    use storage::repository::{InMemoryRepository, StorageError};

    /// Profile store that rejects every write.
    struct FailingProfiles;

    #[async_trait]
    impl ProfileRepository for FailingProfiles {
        async fn create_profile(&self, _: &UserProfile) -> Result<RecordId, StorageError> {
            Err(StorageError::Connection("profiles unavailable".into()))
        }

        async fn get_profile(&self, _: &UserId) -> Result<Option<UserProfile>, StorageError> {
            Ok(None)
        }
    }

    fn session(auth: &InMemoryAuth, profiles: &InMemoryRepository) -> AuthSession {
        AuthSession::new(fixed_clock(), Arc::new(auth.clone()), Arc::new(profiles.clone()))
    }

    #[tokio::test]
    async fn init_without_session_is_signed_out() {
        let session = session(&InMemoryAuth::new(), &InMemoryRepository::new());
        assert!(session.is_loading());

        assert_eq!(session.init().await, None);
        assert!(!session.is_loading());
        assert_eq!(session.current_user(), None);
    }

    #[tokio::test]
    async fn init_picks_up_existing_session() {
        let auth = InMemoryAuth::new();
        auth.create_account("ada@example.com", "analytical", "Ada")
            .await
            .unwrap();
        auth.create_session("ada@example.com", "analytical")
            .await
            .unwrap();

        let session = session(&auth, &InMemoryRepository::new());
        let user = session.init().await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(session.current_user(), Some(user));
    }

    #[tokio::test]
    async fn register_signs_in_and_writes_profile() {
        let profiles = InMemoryRepository::new();
        let session = session(&InMemoryAuth::new(), &profiles);

        let user = session
            .register("ada@example.com", "analytical", "Ada")
            .await
            .unwrap();

        assert_eq!(session.current_user(), Some(user.clone()));
        let profile = profiles.get_profile(&user.id).await.unwrap().unwrap();
        assert_eq!(profile.display_name, "Ada");
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.created_at, fixed_now());
    }

    #[tokio::test]
    async fn register_succeeds_when_profile_write_fails() {
        let session = AuthSession::new(
            fixed_clock(),
            Arc::new(InMemoryAuth::new()),
            Arc::new(FailingProfiles),
        );

        let user = session
            .register("ada@example.com", "analytical", "Ada")
            .await
            .unwrap();
        assert_eq!(session.current_user(), Some(user));
    }

    #[tokio::test]
    async fn register_propagates_duplicate_account() {
        let session = session(&InMemoryAuth::new(), &InMemoryRepository::new());
        session
            .register("ada@example.com", "analytical", "Ada")
            .await
            .unwrap();

        let err = session
            .register("ada@example.com", "analytical", "Ada")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthSessionError::Auth(AuthError::AccountExists)));
    }

    #[tokio::test]
    async fn login_with_bad_password_keeps_user_signed_out() {
        let auth = InMemoryAuth::new();
        auth.create_account("ada@example.com", "analytical", "Ada")
            .await
            .unwrap();
        let session = session(&auth, &InMemoryRepository::new());

        let err = session.login("ada@example.com", "wrong-pass").await.unwrap_err();
        assert!(matches!(
            err,
            AuthSessionError::Auth(AuthError::InvalidCredentials)
        ));
        assert_eq!(session.current_user(), None);
    }

    #[tokio::test]
    async fn logout_clears_user() {
        let session = session(&InMemoryAuth::new(), &InMemoryRepository::new());
        session
            .register("ada@example.com", "analytical", "Ada")
            .await
            .unwrap();

        session.logout().await.unwrap();
        assert_eq!(session.current_user(), None);
    }

    #[tokio::test]
    async fn logout_without_session_propagates() {
        let session = session(&InMemoryAuth::new(), &InMemoryRepository::new());
        let err = session.logout().await.unwrap_err();
        assert!(matches!(err, AuthSessionError::Auth(AuthError::NoSession)));
    }
}
