use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown completion kind: {0}")]
pub struct CompletionKindError(pub String);

/// What kind of learning item was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Tutorial,
    Challenge,
}

impl CompletionKind {
    /// XP awarded for the first completion of an item of this kind.
    #[must_use]
    pub fn xp_reward(self) -> u32 {
        match self {
            CompletionKind::Tutorial => 50,
            CompletionKind::Challenge => 100,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionKind::Tutorial => "tutorial",
            CompletionKind::Challenge => "challenge",
        }
    }
}

impl fmt::Display for CompletionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionKind {
    type Err = CompletionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tutorial" => Ok(Self::Tutorial),
            "challenge" => Ok(Self::Challenge),
            other => Err(CompletionKindError(other.to_owned())),
        }
    }
}
