//! Answer recording and level progression.
//!
//! The familiarity write always lands before level-up is evaluated, and the
//! level-up check is a predicate over stored data rather than an incremental
//! counter. If a process dies between the two, the next answer re-evaluates
//! the same predicate and reaches the same decision.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{SetId, UserId, VocabId};
use crate::repository::VocabRepository;

/// Outcome of a level-up evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUpResult {
    pub leveled_up: bool,
    pub new_level: Option<u32>,
}

impl LevelUpResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn reached(level: u32) -> Self {
        Self {
            leveled_up: true,
            new_level: Some(level),
        }
    }
}

/// Unlock `set_id` for a user at the first level. Returns rows created.
pub fn unlock_set<R>(repo: &R, user_id: UserId, set_id: SetId) -> Result<usize>
where
    R: VocabRepository + ?Sized,
{
    let created = repo.unlock_set(user_id, set_id)?;
    if created > 0 {
        tracing::info!(user_id, set_id, created, "unlocked set");
    }
    Ok(created)
}

/// Record one answer and level the user up if their active set's current
/// level is now fully known.
pub fn record_answer<R>(
    repo: &R,
    user_id: UserId,
    vocab_id: VocabId,
    correct: bool,
) -> Result<LevelUpResult>
where
    R: VocabRepository + ?Sized,
{
    let before = repo.familiarity(user_id, vocab_id)?;
    let after = before.apply(correct);
    repo.record_familiarity(user_id, vocab_id, after, correct)?;
    tracing::debug!(
        user_id,
        vocab_id,
        correct,
        before = before.value(),
        after = after.value(),
        "recorded answer"
    );

    evaluate_level_up(repo, user_id)
}

/// Whether every item at the current level of the user's active set is
/// known. Read-only; repeated calls agree until the data changes.
pub fn check_level_up<R>(repo: &R, user_id: UserId) -> Result<bool>
where
    R: VocabRepository + ?Sized,
{
    let set_id = repo.active_set(user_id)?;
    let level = repo.current_level(user_id, set_id)?;
    level_mastered(repo, user_id, set_id, level)
}

fn level_mastered<R>(repo: &R, user_id: UserId, set_id: SetId, level: u32) -> Result<bool>
where
    R: VocabRepository + ?Sized,
{
    let items = repo.items_at_level(set_id, level)?;
    if items.is_empty() {
        return Ok(false);
    }
    for item in &items {
        if !repo.familiarity(user_id, item.vocab_id)?.is_mastered() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Check the level-up predicate and, when it holds, advance one level and
/// unlock the new level's items. At the last level this is a no-op.
pub fn evaluate_level_up<R>(repo: &R, user_id: UserId) -> Result<LevelUpResult>
where
    R: VocabRepository + ?Sized,
{
    let set_id = repo.active_set(user_id)?;
    let level = repo.current_level(user_id, set_id)?;
    let total_levels = repo.total_levels(set_id)?;

    if level >= total_levels || !level_mastered(repo, user_id, set_id, level)? {
        return Ok(LevelUpResult::none());
    }

    let new_level = level + 1;
    let created = repo.advance_level(user_id, set_id, new_level)?;
    tracing::info!(user_id, set_id, new_level, created, "level up");
    Ok(LevelUpResult::reached(new_level))
}
