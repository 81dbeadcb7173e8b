use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use progress_core::model::{AuthUser, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser, write_error};
use crate::auth::{AuthBackend, AuthError, normalize_email, validate_new_account};
use crate::password::{hash_password, verify_password};
use crate::repository::StorageError;

/// Auth backend over the `accounts`/`sessions` tables.
///
/// Each handle tracks its own current session token, the way a client SDK
/// holds the session cookie for its user.
#[derive(Clone)]
pub struct SqliteAuth {
    repo: SqliteRepository,
    session: Arc<Mutex<Option<String>>>,
}

impl SqliteAuth {
    #[must_use]
    pub fn new(repo: SqliteRepository) -> Self {
        Self {
            repo,
            session: Arc::new(Mutex::new(None)),
        }
    }

    fn current_token(&self) -> Result<Option<String>, StorageError> {
        let guard = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    fn replace_token(&self, token: Option<String>) -> Result<Option<String>, StorageError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(std::mem::replace(&mut *guard, token))
    }
}

fn map_account_row(row: &sqlx::sqlite::SqliteRow) -> Result<AuthUser, StorageError> {
    Ok(AuthUser {
        id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        name: row.try_get("name").map_err(ser)?,
    })
}

#[async_trait]
impl AuthBackend for SqliteAuth {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthUser, AuthError> {
        validate_new_account(email, password)?;
        let user = AuthUser {
            id: UserId::unique(),
            email: normalize_email(email),
            name: name.trim().to_owned(),
        };
        let password_hash = hash_password(password)?;

        sqlx::query(
            r"
            INSERT INTO accounts (user_id, email, name, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(user.id.as_str())
        .bind(user.email.as_str())
        .bind(user.name.as_str())
        .bind(password_hash)
        .bind(self.repo.clock.now())
        .execute(self.repo.pool())
        .await
        .map_err(|e| match write_error(e) {
            StorageError::Conflict => AuthError::AccountExists,
            other => AuthError::Storage(other),
        })?;

        Ok(user)
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let row = sqlx::query("SELECT user_id, password_hash FROM accounts WHERE email = ?1")
            .bind(normalize_email(email))
            .fetch_optional(self.repo.pool())
            .await
            .map_err(conn)?
            .ok_or(AuthError::InvalidCredentials)?;

        let user_id: String = row.try_get("user_id").map_err(ser)?;
        let password_hash: String = row.try_get("password_hash").map_err(ser)?;
        if !verify_password(password, &password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let token = uuid::Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)")
            .bind(token.as_str())
            .bind(user_id)
            .bind(self.repo.clock.now())
            .execute(self.repo.pool())
            .await
            .map_err(conn)?;

        if let Some(previous) = self.replace_token(Some(token))? {
            sqlx::query("DELETE FROM sessions WHERE token = ?1")
                .bind(previous)
                .execute(self.repo.pool())
                .await
                .map_err(conn)?;
        }
        Ok(())
    }

    async fn current_user(&self) -> Result<AuthUser, AuthError> {
        let token = self.current_token()?.ok_or(AuthError::NoSession)?;
        let row = sqlx::query(
            r"
            SELECT a.user_id, a.email, a.name
            FROM sessions s
            JOIN accounts a ON a.user_id = s.user_id
            WHERE s.token = ?1
            ",
        )
        .bind(token)
        .fetch_optional(self.repo.pool())
        .await
        .map_err(conn)?
        .ok_or(AuthError::NoSession)?;

        Ok(map_account_row(&row)?)
    }

    async fn delete_current_session(&self) -> Result<(), AuthError> {
        let token = self.current_token()?.ok_or(AuthError::NoSession)?;
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(self.repo.pool())
            .await
            .map_err(conn)?;
        self.replace_token(None)?;
        Ok(())
    }
}
