mod badge;
mod completion;
mod ids;
mod progress;
mod user;

pub use badge::{Badge, UnknownBadge};
pub use completion::{CompletionKind, CompletionKindError};
pub use ids::{BadgeId, IdError, ItemId, RecordId, UserId};
pub use progress::Progress;
pub use user::{AuthUser, UserProfile};
