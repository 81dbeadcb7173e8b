use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::badge::Badge;
use crate::model::completion::CompletionKind;
use crate::model::ids::{BadgeId, ItemId, RecordId, UserId};

/// Progress snapshot for one user.
///
/// Mirrors the `user-progress` document: the serialized form uses the
/// document's field names (`userId`, `completedTutorials`, `totalXP`, ...)
/// and the remote record id travels as `$id`. Collections that are missing
/// from persisted JSON decode as empty sets.
///
/// Mutation is only possible through [`crate::rules::apply_completion`], which
/// keeps XP and badges monotone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(rename = "$id", default, skip_serializing_if = "Option::is_none")]
    record_id: Option<RecordId>,
    user_id: UserId,
    #[serde(default)]
    completed_tutorials: BTreeSet<ItemId>,
    #[serde(default)]
    completed_challenges: BTreeSet<ItemId>,
    #[serde(rename = "totalXP", default)]
    total_xp: u32,
    #[serde(default)]
    badges: BTreeSet<BadgeId>,
}

impl Progress {
    /// Creates an empty snapshot: no completions, zero XP, no badges.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            record_id: None,
            user_id,
            completed_tutorials: BTreeSet::new(),
            completed_challenges: BTreeSet::new(),
            total_xp: 0,
            badges: BTreeSet::new(),
        }
    }

    /// Rebuilds a snapshot from stored fields.
    #[must_use]
    pub fn from_persisted(
        record_id: Option<RecordId>,
        user_id: UserId,
        completed_tutorials: BTreeSet<ItemId>,
        completed_challenges: BTreeSet<ItemId>,
        total_xp: u32,
        badges: BTreeSet<BadgeId>,
    ) -> Self {
        Self {
            record_id,
            user_id,
            completed_tutorials,
            completed_challenges,
            total_xp,
            badges,
        }
    }

    // Accessors
    #[must_use]
    pub fn record_id(&self) -> Option<&RecordId> {
        self.record_id.as_ref()
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn completed_tutorials(&self) -> &BTreeSet<ItemId> {
        &self.completed_tutorials
    }

    #[must_use]
    pub fn completed_challenges(&self) -> &BTreeSet<ItemId> {
        &self.completed_challenges
    }

    #[must_use]
    pub fn total_xp(&self) -> u32 {
        self.total_xp
    }

    #[must_use]
    pub fn badges(&self) -> &BTreeSet<BadgeId> {
        &self.badges
    }

    #[must_use]
    pub fn has_badge(&self, badge: Badge) -> bool {
        self.badges.iter().any(|id| id.as_str() == badge.id())
    }

    /// Level derived from total XP; not persisted.
    #[must_use]
    pub fn level(&self) -> u32 {
        crate::rules::level_for_xp(self.total_xp)
    }

    /// Returns this snapshot tagged with a remote record id.
    #[must_use]
    pub fn with_record_id(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub(crate) fn insert_completion(&mut self, kind: CompletionKind, item_id: ItemId) -> bool {
        match kind {
            CompletionKind::Tutorial => self.completed_tutorials.insert(item_id),
            CompletionKind::Challenge => self.completed_challenges.insert(item_id),
        }
    }

    pub(crate) fn add_xp(&mut self, xp: u32) {
        self.total_xp = self.total_xp.saturating_add(xp);
    }

    pub(crate) fn award(&mut self, badge: Badge) -> bool {
        self.badges.insert(badge.badge_id())
    }
}
