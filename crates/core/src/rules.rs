use std::collections::BTreeSet;

use crate::model::{Badge, BadgeId, CompletionKind, ItemId, Progress};

/// XP span of one level.
pub const XP_PER_LEVEL: u32 = 100;

//
// ─── BADGE RULES ───────────────────────────────────────────────────────────────
//

/// Quantity a badge threshold is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    Tutorials(usize),
    Challenges(usize),
    TotalXp(u32),
}

impl Threshold {
    fn is_met(self, tutorials: usize, challenges: usize, total_xp: u32) -> bool {
        match self {
            Threshold::Tutorials(min) => tutorials >= min,
            Threshold::Challenges(min) => challenges >= min,
            Threshold::TotalXp(min) => total_xp >= min,
        }
    }
}

/// A badge paired with the threshold that unlocks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeRule {
    pub badge: Badge,
    pub threshold: Threshold,
}

/// Every rule is a monotone one-shot trigger, so evaluation order does not
/// affect the result.
pub const BADGE_RULES: [BadgeRule; 4] = [
    BadgeRule {
        badge: Badge::FirstSteps,
        threshold: Threshold::Tutorials(1),
    },
    BadgeRule {
        badge: Badge::DedicatedLearner,
        threshold: Threshold::Tutorials(10),
    },
    BadgeRule {
        badge: Badge::ChallengeMaster,
        threshold: Threshold::Challenges(5),
    },
    BadgeRule {
        badge: Badge::XpCollector,
        threshold: Threshold::TotalXp(500),
    },
];

/// Badges whose thresholds are met by the given counts and XP.
#[must_use]
pub fn earned_badges(tutorials: usize, challenges: usize, total_xp: u32) -> Vec<Badge> {
    BADGE_RULES
        .iter()
        .filter(|rule| rule.threshold.is_met(tutorials, challenges, total_xp))
        .map(|rule| rule.badge)
        .collect()
}

/// Level derived from XP: `floor(xp / 100) + 1`.
#[must_use]
pub fn level_for_xp(total_xp: u32) -> u32 {
    total_xp / XP_PER_LEVEL + 1
}

//
// ─── COMPLETION ────────────────────────────────────────────────────────────────
//

/// Result of applying one completion event to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub progress: Progress,
    pub xp_gained: u32,
    /// Badges added by this event only, in rule order.
    pub new_badges: Vec<Badge>,
}

impl CompletionOutcome {
    /// True when the item was already completed and nothing changed.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.xp_gained == 0 && self.new_badges.is_empty()
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.progress.level()
    }
}

/// Applies a completed tutorial or challenge to a snapshot.
///
/// Completing an item that is already in the matching set returns the
/// snapshot unchanged with no XP and no badges, so replaying an event is
/// harmless. Otherwise the item is added, the kind's XP reward is credited,
/// and every threshold is re-evaluated against the updated counts.
///
/// # Examples
///
/// ```
/// # use progress_core::model::{Badge, CompletionKind, ItemId, Progress, UserId};
/// # use progress_core::rules::apply_completion;
/// let progress = Progress::new(UserId::new("u-1").unwrap());
/// let item = ItemId::new("hello-world").unwrap();
///
/// let outcome = apply_completion(&progress, CompletionKind::Tutorial, &item);
/// assert_eq!(outcome.xp_gained, 50);
/// assert_eq!(outcome.new_badges, vec![Badge::FirstSteps]);
///
/// let again = apply_completion(&outcome.progress, CompletionKind::Tutorial, &item);
/// assert!(again.is_noop());
/// assert_eq!(again.progress, outcome.progress);
/// ```
#[must_use]
pub fn apply_completion(
    progress: &Progress,
    kind: CompletionKind,
    item_id: &ItemId,
) -> CompletionOutcome {
    let mut next = progress.clone();
    if !next.insert_completion(kind, item_id.clone()) {
        return CompletionOutcome {
            progress: next,
            xp_gained: 0,
            new_badges: Vec::new(),
        };
    }

    let xp_gained = kind.xp_reward();
    next.add_xp(xp_gained);

    let new_badges = earned_badges(
        next.completed_tutorials().len(),
        next.completed_challenges().len(),
        next.total_xp(),
    )
    .into_iter()
    .filter(|badge| next.award(*badge))
    .collect();

    CompletionOutcome {
        progress: next,
        xp_gained,
        new_badges,
    }
}

//
// ─── MERGE ─────────────────────────────────────────────────────────────────────
//

/// XP implied by a set of completions alone.
#[must_use]
pub fn xp_for_counts(tutorials: usize, challenges: usize) -> u32 {
    let reward = |count: usize, kind: CompletionKind| {
        u32::try_from(count)
            .unwrap_or(u32::MAX)
            .saturating_mul(kind.xp_reward())
    };
    reward(tutorials, CompletionKind::Tutorial)
        .saturating_add(reward(challenges, CompletionKind::Challenge))
}

/// Combines two snapshots of the same user without losing anything either holds.
///
/// Completion and badge sets are unioned. XP is the largest of both stored
/// totals and the total implied by the merged completions, and thresholds
/// are re-evaluated on the result. The record id of `remote` wins when
/// present. The user id is taken from `local`.
#[must_use]
pub fn merge_snapshots(local: &Progress, remote: &Progress) -> Progress {
    let tutorials: BTreeSet<ItemId> = local
        .completed_tutorials()
        .union(remote.completed_tutorials())
        .cloned()
        .collect();
    let challenges: BTreeSet<ItemId> = local
        .completed_challenges()
        .union(remote.completed_challenges())
        .cloned()
        .collect();
    let total_xp = xp_for_counts(tutorials.len(), challenges.len())
        .max(local.total_xp())
        .max(remote.total_xp());

    let mut badges: BTreeSet<BadgeId> = local.badges().union(remote.badges()).cloned().collect();
    badges.extend(
        earned_badges(tutorials.len(), challenges.len(), total_xp)
            .into_iter()
            .map(Badge::badge_id),
    );

    Progress::from_persisted(
        remote.record_id().or(local.record_id()).cloned(),
        local.user_id().clone(),
        tutorials,
        challenges,
        total_xp,
        badges,
    )
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;

    fn empty() -> Progress {
        Progress::new(UserId::new("learner").unwrap())
    }

    fn item(id: &str) -> ItemId {
        ItemId::new(id).unwrap()
    }

    fn complete_many(mut progress: Progress, kind: CompletionKind, prefix: &str, n: usize) -> Progress {
        for i in 0..n {
            progress = apply_completion(&progress, kind, &item(&format!("{prefix}-{i}"))).progress;
        }
        progress
    }

    #[test]
    fn first_tutorial_unlocks_only_first_steps() {
        let outcome = apply_completion(&empty(), CompletionKind::Tutorial, &item("t-1"));
        assert_eq!(outcome.xp_gained, 50);
        assert_eq!(outcome.progress.total_xp(), 50);
        assert_eq!(outcome.new_badges, vec![Badge::FirstSteps]);
        assert_eq!(outcome.progress.badges().len(), 1);
    }

    #[test]
    fn challenge_awards_hundred_xp_and_no_tutorial_badge() {
        let outcome = apply_completion(&empty(), CompletionKind::Challenge, &item("c-1"));
        assert_eq!(outcome.xp_gained, 100);
        assert!(outcome.new_badges.is_empty());
        assert!(outcome.progress.completed_challenges().contains(&item("c-1")));
        assert!(outcome.progress.completed_tutorials().is_empty());
    }

    #[test]
    fn repeated_completion_is_idempotent() {
        let once = apply_completion(&empty(), CompletionKind::Challenge, &item("c-1"));
        let twice = apply_completion(&once.progress, CompletionKind::Challenge, &item("c-1"));
        assert_eq!(twice.progress, once.progress);
        assert_eq!(twice.xp_gained, 0);
        assert!(twice.new_badges.is_empty());
        assert!(twice.is_noop());
    }

    #[test]
    fn same_id_under_other_kind_counts_separately() {
        let tutorial = apply_completion(&empty(), CompletionKind::Tutorial, &item("shared"));
        let challenge = apply_completion(&tutorial.progress, CompletionKind::Challenge, &item("shared"));
        assert_eq!(challenge.xp_gained, 100);
        assert_eq!(challenge.progress.total_xp(), 150);
    }

    #[test]
    fn mixed_completions_sum_xp_and_level() {
        let progress = complete_many(empty(), CompletionKind::Tutorial, "t", 3);
        let progress = complete_many(progress, CompletionKind::Challenge, "c", 2);
        assert_eq!(progress.total_xp(), 350);
        assert_eq!(progress.level(), 4);
    }

    #[test]
    fn dedicated_learner_waits_for_tenth_tutorial() {
        let nine = complete_many(empty(), CompletionKind::Tutorial, "t", 9);
        assert!(!nine.has_badge(Badge::DedicatedLearner));

        let tenth = apply_completion(&nine, CompletionKind::Tutorial, &item("t-9"));
        assert!(tenth.new_badges.contains(&Badge::DedicatedLearner));
        assert!(tenth.progress.has_badge(Badge::DedicatedLearner));
    }

    #[test]
    fn tutorials_alone_trigger_xp_collector() {
        let nine = complete_many(empty(), CompletionKind::Tutorial, "t", 9);
        assert_eq!(nine.total_xp(), 450);
        assert!(!nine.has_badge(Badge::XpCollector));

        let tenth = apply_completion(&nine, CompletionKind::Tutorial, &item("t-9"));
        assert_eq!(tenth.progress.total_xp(), 500);
        assert_eq!(
            tenth.new_badges,
            vec![Badge::DedicatedLearner, Badge::XpCollector]
        );
    }

    #[test]
    fn fifth_challenge_unlocks_challenge_master_and_xp_collector() {
        let four = complete_many(empty(), CompletionKind::Challenge, "c", 4);
        let fifth = apply_completion(&four, CompletionKind::Challenge, &item("c-4"));
        assert_eq!(
            fifth.new_badges,
            vec![Badge::ChallengeMaster, Badge::XpCollector]
        );
    }

    #[test]
    fn xp_and_badges_never_shrink() {
        let mut progress = empty();
        let events = [
            (CompletionKind::Tutorial, "a"),
            (CompletionKind::Challenge, "b"),
            (CompletionKind::Tutorial, "a"),
            (CompletionKind::Challenge, "c"),
            (CompletionKind::Challenge, "b"),
            (CompletionKind::Tutorial, "d"),
        ];
        for (kind, id) in events {
            let outcome = apply_completion(&progress, kind, &item(id));
            assert!(outcome.progress.total_xp() >= progress.total_xp());
            assert!(outcome.progress.badges().is_superset(progress.badges()));
            progress = outcome.progress;
        }
        assert_eq!(progress.total_xp(), 50 + 100 + 100 + 50);
    }

    #[test]
    fn recomputed_badges_match_stored_set() {
        let progress = complete_many(empty(), CompletionKind::Tutorial, "t", 4);
        let progress = complete_many(progress, CompletionKind::Challenge, "c", 5);
        let recomputed = earned_badges(
            progress.completed_tutorials().len(),
            progress.completed_challenges().len(),
            progress.total_xp(),
        );
        let stored: Vec<Badge> = progress
            .badges()
            .iter()
            .filter_map(|id| Badge::from_id(id.as_str()))
            .collect();
        assert_eq!(recomputed.len(), stored.len());
        for badge in recomputed {
            assert!(progress.has_badge(badge));
        }
    }

    #[test]
    fn already_held_badges_are_not_reported_again() {
        let progress = complete_many(empty(), CompletionKind::Tutorial, "t", 1);
        let outcome = apply_completion(&progress, CompletionKind::Tutorial, &item("t-new"));
        assert_eq!(outcome.xp_gained, 50);
        assert!(outcome.new_badges.is_empty());
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(350), 4);
    }

    #[test]
    fn merge_keeps_everything_either_side_holds() {
        let remote = complete_many(empty(), CompletionKind::Tutorial, "t", 10)
            .with_record_id(crate::model::RecordId::new("rec-1").unwrap());
        let local = apply_completion(&empty(), CompletionKind::Challenge, &item("c-1")).progress;

        let merged = merge_snapshots(&local, &remote);

        assert_eq!(merged.completed_tutorials().len(), 10);
        assert!(merged.completed_challenges().contains(&item("c-1")));
        assert_eq!(merged.total_xp(), 600);
        assert!(merged.has_badge(Badge::FirstSteps));
        assert!(merged.has_badge(Badge::DedicatedLearner));
        assert!(merged.has_badge(Badge::XpCollector));
        assert_eq!(merged.record_id().map(|id| id.as_str()), Some("rec-1"));
    }

    #[test]
    fn merge_never_lowers_stored_xp_or_drops_unknown_badges() {
        let legacy = Progress::from_persisted(
            None,
            UserId::new("learner").unwrap(),
            Default::default(),
            Default::default(),
            700,
            [BadgeId::new("beta-tester").unwrap()].into_iter().collect(),
        );

        let merged = merge_snapshots(&empty(), &legacy);

        assert_eq!(merged.total_xp(), 700);
        assert!(merged.badges().contains(&BadgeId::new("beta-tester").unwrap()));
        assert!(merged.has_badge(Badge::XpCollector));
        assert_eq!(merged, merge_snapshots(&merged, &legacy));
    }

    #[test]
    fn xp_for_counts_matches_rewards() {
        assert_eq!(xp_for_counts(3, 2), 350);
        assert_eq!(xp_for_counts(0, 0), 0);
    }

    #[test]
    fn xp_saturates_instead_of_overflowing() {
        let progress = Progress::from_persisted(
            None,
            UserId::new("learner").unwrap(),
            Default::default(),
            Default::default(),
            u32::MAX - 10,
            Default::default(),
        );
        let outcome = apply_completion(&progress, CompletionKind::Challenge, &item("c"));
        assert_eq!(outcome.progress.total_xp(), u32::MAX);
    }
}
