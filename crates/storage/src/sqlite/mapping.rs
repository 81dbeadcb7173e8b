use std::collections::BTreeSet;

use progress_core::model::{Progress, RecordId, UserId, UserProfile};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Set-valued document fields are stored as JSON arrays.
pub(crate) fn encode_set<T: Serialize>(set: &BTreeSet<T>) -> Result<String, StorageError> {
    serde_json::to_string(set).map_err(ser)
}

pub(crate) fn decode_set<T: DeserializeOwned + Ord>(raw: &str) -> Result<BTreeSet<T>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn xp_from_i64(v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid total_xp: {v}")))
}

/// Maps a unique-constraint violation to `Conflict`; anything else is a connection error.
pub(crate) fn write_error(err: sqlx::Error) -> StorageError {
    let unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        StorageError::Conflict
    } else {
        conn(err)
    }
}

pub(crate) fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<Progress, StorageError> {
    let record_id = RecordId::new(row.try_get::<String, _>("record_id").map_err(ser)?).map_err(ser)?;
    let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?;
    let tutorials = decode_set(&row.try_get::<String, _>("completed_tutorials").map_err(ser)?)?;
    let challenges = decode_set(&row.try_get::<String, _>("completed_challenges").map_err(ser)?)?;
    let total_xp = xp_from_i64(row.try_get::<i64, _>("total_xp").map_err(ser)?)?;
    let badges = decode_set(&row.try_get::<String, _>("badges").map_err(ser)?)?;

    Ok(Progress::from_persisted(
        Some(record_id),
        user_id,
        tutorials,
        challenges,
        total_xp,
        badges,
    ))
}

pub(crate) fn map_profile_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, StorageError> {
    Ok(UserProfile {
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
        display_name: row.try_get("display_name").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
