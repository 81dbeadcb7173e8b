use progress_core::model::{Progress, RecordId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, encode_set, map_progress_row, write_error};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Progress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT record_id, user_id, completed_tutorials, completed_challenges, total_xp, badges
            FROM user_progress
            WHERE user_id = ?1
            LIMIT 1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn create(&self, progress: &Progress) -> Result<RecordId, StorageError> {
        let record_id = RecordId::unique();

        sqlx::query(
            r"
            INSERT INTO user_progress (
                record_id, user_id, completed_tutorials, completed_challenges,
                total_xp, badges, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(record_id.as_str())
        .bind(progress.user_id().as_str())
        .bind(encode_set(progress.completed_tutorials())?)
        .bind(encode_set(progress.completed_challenges())?)
        .bind(i64::from(progress.total_xp()))
        .bind(encode_set(progress.badges())?)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(record_id)
    }

    async fn update(&self, record_id: &RecordId, progress: &Progress) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE user_progress SET
                completed_tutorials = ?2,
                completed_challenges = ?3,
                total_xp = ?4,
                badges = ?5,
                updated_at = ?6
            WHERE record_id = ?1
            ",
        )
        .bind(record_id.as_str())
        .bind(encode_set(progress.completed_tutorials())?)
        .bind(encode_set(progress.completed_challenges())?)
        .bind(i64::from(progress.total_xp()))
        .bind(encode_set(progress.badges())?)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
