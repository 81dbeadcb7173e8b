use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when an identifier is empty or whitespace-only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} must not be empty")]
pub struct IdError {
    kind: &'static str,
}

impl IdError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

fn non_empty(kind: &'static str, raw: String) -> Result<String, IdError> {
    if raw.trim().is_empty() {
        return Err(IdError { kind });
    }
    Ok(raw)
}

/// Identifier of an authenticated user (the auth subject).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Creates a new `UserId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` if the value is empty or whitespace-only.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        non_empty("UserId", id.into()).map(Self)
    }

    /// Generates a fresh account id.
    #[must_use]
    pub fn unique() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a tutorial or challenge.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    /// Creates a new `ItemId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` if the value is empty or whitespace-only.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        non_empty("ItemId", id.into()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier assigned by the remote document store.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Creates a new `RecordId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` if the value is empty or whitespace-only.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        non_empty("RecordId", id.into()).map(Self)
    }

    /// Generates a fresh, unique record id.
    #[must_use]
    pub fn unique() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a badge as stored on a progress document.
///
/// Kept as a string so documents carrying badges unknown to this build still load.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BadgeId(String);

impl BadgeId {
    /// Creates a new `BadgeId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` if the value is empty or whitespace-only.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        non_empty("BadgeId", id.into()).map(Self)
    }

    /// Catalogue ids are non-empty literals and skip validation.
    pub(crate) fn from_static(id: &'static str) -> Self {
        Self(id.to_owned())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ─── Conversions ───────────────────────────────────────────────────────────────

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for ItemId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for RecordId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for BadgeId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl From<BadgeId> for String {
    fn from(id: BadgeId) -> Self {
        id.0
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for ItemId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for RecordId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for BadgeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ─── Debug / Display ───────────────────────────────────────────────────────────

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Debug for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BadgeId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_blank() {
        let err = UserId::new("   ").unwrap_err();
        assert_eq!(err.kind(), "UserId");
        assert_eq!(err.to_string(), "UserId must not be empty");
    }

    #[test]
    fn item_id_from_str() {
        let id: ItemId = "intro-to-rust".parse().unwrap();
        assert_eq!(id.as_str(), "intro-to-rust");
        assert_eq!(id.to_string(), "intro-to-rust");
    }

    #[test]
    fn record_id_unique_is_fresh() {
        let a = RecordId::unique();
        let b = RecordId::unique();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn serde_rejects_empty_id() {
        let err = serde_json::from_str::<BadgeId>("\"\"");
        assert!(err.is_err());

        let ok: BadgeId = serde_json::from_str("\"first-steps\"").unwrap();
        assert_eq!(ok.as_str(), "first-steps");
    }

    #[test]
    fn debug_includes_type_name() {
        let id = UserId::new("u-1").unwrap();
        assert_eq!(format!("{id:?}"), "UserId(u-1)");
    }
}
