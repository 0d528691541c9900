use crate::validate::ValidationError;

/// Typed outcomes of room operations. The HTTP layer decides how each one
/// is reported.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("name {0:?} is already in use")]
    Conflict(String),

    #[error("participant {0:?} is not in the room")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type ChatResult<T> = Result<T, ChatError>;
