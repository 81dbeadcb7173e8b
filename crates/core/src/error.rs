use thiserror::Error;

use crate::model::{CompletionKindError, IdError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    CompletionKind(#[from] CompletionKindError),
}
