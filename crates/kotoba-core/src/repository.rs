//! Storage contract the engine runs against.
//!
//! Implementations only need single-row atomicity for
//! [`VocabRepository::record_familiarity`]. [`VocabRepository::advance_level`]
//! must move the level and create the new level's rows together.

use crate::error::Result;
use crate::familiarity::Familiarity;
use crate::model::{ItemProgress, SetId, UserId, UserSetProgress, VocabId, VocabularyItem};

pub trait VocabRepository {
    /// Current familiarity of one item. `UnknownProgress` if the row is absent.
    fn familiarity(&self, user_id: UserId, vocab_id: VocabId) -> Result<Familiarity>;

    /// Full tracking row for one item. `UnknownProgress` if absent.
    fn item_progress(&self, user_id: UserId, vocab_id: VocabId) -> Result<ItemProgress>;

    /// Write the new familiarity and bump `times_shown` (and `times_correct`
    /// when `correct`) in one step.
    fn record_familiarity(
        &self,
        user_id: UserId,
        vocab_id: VocabId,
        value: Familiarity,
        correct: bool,
    ) -> Result<()>;

    /// Items of `set_id` the user has unlocked whose familiarity is `bucket`.
    fn items_by_bucket(
        &self,
        user_id: UserId,
        set_id: SetId,
        bucket: Familiarity,
    ) -> Result<Vec<VocabularyItem>>;

    /// Catalog items at one level of a set, in catalog order.
    fn items_at_level(&self, set_id: SetId, level: u32) -> Result<Vec<VocabularyItem>>;

    /// Create fresh rows for every item at `level`. Existing rows are left
    /// untouched. Returns the number of rows created.
    ///
    /// `SetNotUnlocked` unless the user has unlocked the set, and
    /// `LevelNotReached` when `level` is above their current level.
    fn unlock_level(&self, user_id: UserId, set_id: SetId, level: u32) -> Result<usize>;

    /// Record a set as unlocked at the first level and create its rows.
    /// Makes the set active when the user has none. Returns rows created;
    /// zero when the set was already unlocked.
    fn unlock_set(&self, user_id: UserId, set_id: SetId) -> Result<usize>;

    /// Move the user to `new_level` and unlock it, atomically.
    /// `LevelRegression` unless `new_level` is above the current level.
    fn advance_level(&self, user_id: UserId, set_id: SetId, new_level: u32) -> Result<usize>;

    fn active_set(&self, user_id: UserId) -> Result<SetId>;

    /// `SetNotUnlocked` unless the user has unlocked `set_id`.
    fn set_active_set(&self, user_id: UserId, set_id: SetId) -> Result<()>;

    fn current_level(&self, user_id: UserId, set_id: SetId) -> Result<u32>;

    fn total_levels(&self, set_id: SetId) -> Result<u32>;

    /// Every set the user has unlocked.
    fn set_progress(&self, user_id: UserId) -> Result<Vec<UserSetProgress>>;
}
