use progress_core::model::{RecordId, UserId, UserProfile};

use super::SqliteRepository;
use super::mapping::{conn, map_profile_row, write_error};
use crate::repository::{ProfileRepository, StorageError};

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn create_profile(&self, profile: &UserProfile) -> Result<RecordId, StorageError> {
        let record_id = RecordId::unique();

        sqlx::query(
            r"
            INSERT INTO user_profiles (record_id, user_id, display_name, email, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(record_id.as_str())
        .bind(profile.user_id.as_str())
        .bind(profile.display_name.as_str())
        .bind(profile.email.as_str())
        .bind(profile.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(record_id)
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<UserProfile>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, display_name, email, created_at
            FROM user_profiles
            WHERE user_id = ?1
            ORDER BY created_at ASC
            LIMIT 1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_profile_row).transpose()
    }
}
