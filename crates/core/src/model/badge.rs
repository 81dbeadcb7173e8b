use std::fmt;
use std::str::FromStr;

use crate::model::ids::BadgeId;

/// Achievements known to this build.
///
/// A badge is awarded once and never revoked. Thresholds live in
/// [`crate::rules`]; this type only carries identity and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Badge {
    FirstSteps,
    DedicatedLearner,
    ChallengeMaster,
    XpCollector,
}

impl Badge {
    pub const ALL: [Badge; 4] = [
        Badge::FirstSteps,
        Badge::DedicatedLearner,
        Badge::ChallengeMaster,
        Badge::XpCollector,
    ];

    /// Stable identifier stored on progress documents.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Badge::FirstSteps => "first-steps",
            Badge::DedicatedLearner => "dedicated-learner",
            Badge::ChallengeMaster => "challenge-master",
            Badge::XpCollector => "xp-collector",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Badge::FirstSteps => "First Steps",
            Badge::DedicatedLearner => "Dedicated Learner",
            Badge::ChallengeMaster => "Challenge Master",
            Badge::XpCollector => "XP Collector",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Badge::FirstSteps => "Complete your first tutorial",
            Badge::DedicatedLearner => "Complete 10 tutorials",
            Badge::ChallengeMaster => "Complete 5 challenges",
            Badge::XpCollector => "Earn 500 XP",
        }
    }

    #[must_use]
    pub fn badge_id(self) -> BadgeId {
        BadgeId::from(self)
    }

    /// Looks up a catalogue entry by its stored identifier.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|badge| badge.id() == id)
    }
}

impl From<Badge> for BadgeId {
    fn from(badge: Badge) -> Self {
        BadgeId::from_static(badge.id())
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Error returned when a badge id is not in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown badge: {0}")]
pub struct UnknownBadge(pub String);

impl FromStr for Badge {
    type Err = UnknownBadge;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| UnknownBadge(s.to_owned()))
    }
}
