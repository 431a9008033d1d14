use thiserror::Error;

use crate::model::{SetId, UserId, VocabId};

/// Errors raised by the quiz engine and by repository implementations.
///
/// None of these are retried: each one means the request was structurally
/// invalid or the stored data broke an invariant.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("user {user_id} has no progress for vocab {vocab_id}")]
    UnknownProgress { user_id: UserId, vocab_id: VocabId },

    #[error("no eligible item for user {user_id} in set {set_id}")]
    NoEligibleItem { user_id: UserId, set_id: SetId },

    #[error("unknown user {0}")]
    UnknownUser(UserId),

    #[error("user {0} has no active set")]
    NoActiveSet(UserId),

    #[error("unknown set {0}")]
    UnknownSet(SetId),

    #[error("set {set_id} is not unlocked for user {user_id}")]
    SetNotUnlocked { user_id: UserId, set_id: SetId },

    #[error(
        "level for user {user_id} in set {set_id} cannot move from {current} to {requested}"
    )]
    LevelRegression {
        user_id: UserId,
        set_id: SetId,
        current: u32,
        requested: u32,
    },

    #[error("set {set_id} has {total_levels} levels, level {level} does not exist")]
    LevelOutOfRange {
        set_id: SetId,
        level: u32,
        total_levels: u32,
    },

    #[error("user {user_id} is at level {current} of set {set_id}, level {level} is still locked")]
    LevelNotReached {
        user_id: UserId,
        set_id: SetId,
        level: u32,
        current: u32,
    },

    #[error("invalid bucket weights: {0}")]
    InvalidWeights(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, QuizError>;
