use std::sync::Arc;

use progress_core::model::{BadgeId, CompletionKind, ItemId, UserId};
use progress_core::rules::apply_completion;
use serde::{Deserialize, Serialize};
use storage::repository::{ProgressRepository, StorageError};
use tracing::{error, info};

use crate::error::ProgressFunctionError;

/// Body of a progress calculation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateRequest {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: CompletionKind,
    pub item_id: ItemId,
}

/// Successful result of a progress calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateSummary {
    pub success: bool,
    pub xp_gained: u32,
    #[serde(rename = "totalXP")]
    pub total_xp: u32,
    pub new_badges: Vec<BadgeId>,
    pub current_level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FunctionBody {
    Success(ProgressUpdateSummary),
    Error { error: String },
}

/// Status code and JSON body returned to the function caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionResponse {
    pub status: u16,
    pub body: FunctionBody,
}

impl FunctionResponse {
    fn ok(summary: ProgressUpdateSummary) -> Self {
        Self {
            status: 200,
            body: FunctionBody::Success(summary),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: FunctionBody::Error {
                error: message.into(),
            },
        }
    }
}

/// Server-side handler that applies one completion event to a stored document.
#[derive(Clone)]
pub struct ProgressFunction {
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressFunction {
    #[must_use]
    pub fn new(progress: Arc<dyn ProgressRepository>) -> Self {
        Self { progress }
    }

    /// Apply the request to the user's stored progress and write it back.
    ///
    /// A completion the user already has is reported with zero XP and no
    /// badges, and the document is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `ProgressFunctionError::NotFound` if the user has no progress
    /// document, or `ProgressFunctionError::Storage` if the lookup or the
    /// write fails.
    pub async fn calculate(
        &self,
        request: &ProgressUpdateRequest,
    ) -> Result<ProgressUpdateSummary, ProgressFunctionError> {
        let current = self
            .progress
            .find_by_user(&request.user_id)
            .await?
            .ok_or(ProgressFunctionError::NotFound)?;
        let record_id = current
            .record_id()
            .cloned()
            .ok_or(StorageError::NotFound)?;

        let outcome = apply_completion(&current, request.kind, &request.item_id);
        if !outcome.is_noop() {
            self.progress.update(&record_id, &outcome.progress).await?;
        }

        Ok(ProgressUpdateSummary {
            success: true,
            xp_gained: outcome.xp_gained,
            total_xp: outcome.progress.total_xp(),
            new_badges: outcome.new_badges.iter().map(|badge| badge.badge_id()).collect(),
            current_level: outcome.level(),
        })
    }

    /// Parse a raw request body and produce the response to send back.
    ///
    /// Never fails: an unknown user yields `{error}` with status 200, any
    /// other failure yields `{error}` with status 500.
    pub async fn handle(&self, body: &str) -> FunctionResponse {
        let result = match serde_json::from_str::<ProgressUpdateRequest>(body) {
            Ok(request) => self
                .calculate(&request)
                .await
                .map(|summary| (request, summary)),
            Err(err) => Err(ProgressFunctionError::from(err)),
        };

        match result {
            Ok((request, summary)) => {
                info!(
                    user_id = %request.user_id,
                    kind = %request.kind,
                    item_id = %request.item_id,
                    xp_gained = summary.xp_gained,
                    total_xp = summary.total_xp,
                    new_badges = summary.new_badges.len(),
                    "updated progress"
                );
                FunctionResponse::ok(summary)
            }
            Err(ProgressFunctionError::NotFound) => {
                FunctionResponse::error(200, ProgressFunctionError::NotFound.to_string())
            }
            Err(err) => {
                error!(error = %err, "progress calculation failed");
                FunctionResponse::error(500, err.to_string())
            }
        }
    }
}
