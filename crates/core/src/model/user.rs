use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;

/// Account reported by the auth service for the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
}

/// Profile document written to `user-profiles` at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    #[must_use]
    pub fn for_user(user: &AuthUser, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id.clone(),
            display_name: user.name.clone(),
            email: user.email.clone(),
            created_at,
        }
    }
}
