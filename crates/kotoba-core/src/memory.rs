//! In-memory [`VocabRepository`], for tests and for embedding the engine
//! without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::constants::FIRST_LEVEL;
use crate::error::{QuizError, Result};
use crate::familiarity::Familiarity;
use crate::model::{
    ItemProgress, SetId, UserId, UserSetProgress, VocabId, VocabSet, VocabularyItem,
};
use crate::repository::VocabRepository;

#[derive(Default)]
struct State {
    sets: BTreeMap<SetId, VocabSet>,
    items: BTreeMap<VocabId, VocabularyItem>,
    /// user → active set
    users: HashMap<UserId, Option<SetId>>,
    unlocked: BTreeMap<(UserId, SetId), u32>,
    rows: BTreeMap<(UserId, VocabId), ItemProgress>,
}

impl State {
    fn set(&self, set_id: SetId) -> Result<&VocabSet> {
        self.sets.get(&set_id).ok_or(QuizError::UnknownSet(set_id))
    }

    fn level_of(&self, user_id: UserId, set_id: SetId) -> Result<u32> {
        self.unlocked
            .get(&(user_id, set_id))
            .copied()
            .ok_or(QuizError::SetNotUnlocked { user_id, set_id })
    }

    fn unlock_level(&mut self, user_id: UserId, set_id: SetId, level: u32) -> usize {
        let ids: Vec<VocabId> = self
            .items
            .values()
            .filter(|it| it.set_id == set_id && it.level == level)
            .map(|it| it.vocab_id)
            .collect();
        let mut created = 0;
        for vocab_id in ids {
            if let std::collections::btree_map::Entry::Vacant(slot) =
                self.rows.entry((user_id, vocab_id))
            {
                slot.insert(ItemProgress::new(user_id, vocab_id));
                created += 1;
            }
        }
        created
    }
}

/// Catalog plus learner state held behind a mutex.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_set(&self, set: VocabSet) {
        self.lock().sets.insert(set.set_id, set);
    }

    /// Add a catalog item. The owning set must exist and the level must be
    /// within its range.
    pub fn add_item(&self, item: VocabularyItem) -> Result<()> {
        let mut state = self.lock();
        let set = state.set(item.set_id)?;
        if item.level < FIRST_LEVEL || item.level > set.total_levels {
            return Err(QuizError::LevelOutOfRange {
                set_id: item.set_id,
                level: item.level,
                total_levels: set.total_levels,
            });
        }
        state.items.insert(item.vocab_id, item);
        Ok(())
    }

    pub fn add_user(&self, user_id: UserId) {
        self.lock().users.entry(user_id).or_insert(None);
    }

    /// Overwrite an existing row's familiarity without touching counters.
    pub fn seed_familiarity(
        &self,
        user_id: UserId,
        vocab_id: VocabId,
        value: Familiarity,
    ) -> Result<()> {
        let mut state = self.lock();
        let row = state
            .rows
            .get_mut(&(user_id, vocab_id))
            .ok_or(QuizError::UnknownProgress { user_id, vocab_id })?;
        row.familiarity = value;
        Ok(())
    }

    /// Number of tracking rows the user has.
    pub fn row_count(&self, user_id: UserId) -> usize {
        self.lock()
            .rows
            .keys()
            .filter(|(uid, _)| *uid == user_id)
            .count()
    }
}

impl VocabRepository for MemoryRepository {
    fn familiarity(&self, user_id: UserId, vocab_id: VocabId) -> Result<Familiarity> {
        self.item_progress(user_id, vocab_id).map(|row| row.familiarity)
    }

    fn item_progress(&self, user_id: UserId, vocab_id: VocabId) -> Result<ItemProgress> {
        self.lock()
            .rows
            .get(&(user_id, vocab_id))
            .copied()
            .ok_or(QuizError::UnknownProgress { user_id, vocab_id })
    }

    fn record_familiarity(
        &self,
        user_id: UserId,
        vocab_id: VocabId,
        value: Familiarity,
        correct: bool,
    ) -> Result<()> {
        let mut state = self.lock();
        let row = state
            .rows
            .get_mut(&(user_id, vocab_id))
            .ok_or(QuizError::UnknownProgress { user_id, vocab_id })?;
        row.record(value, correct);
        Ok(())
    }

    fn items_by_bucket(
        &self,
        user_id: UserId,
        set_id: SetId,
        bucket: Familiarity,
    ) -> Result<Vec<VocabularyItem>> {
        let state = self.lock();
        let level = state.level_of(user_id, set_id)?;
        Ok(state
            .rows
            .range((user_id, VocabId::MIN)..=(user_id, VocabId::MAX))
            .filter(|(_, row)| row.familiarity == bucket)
            .filter_map(|((_, vocab_id), _)| state.items.get(vocab_id))
            .filter(|it| it.set_id == set_id && it.level <= level)
            .cloned()
            .collect())
    }

    fn items_at_level(&self, set_id: SetId, level: u32) -> Result<Vec<VocabularyItem>> {
        let state = self.lock();
        state.set(set_id)?;
        Ok(state
            .items
            .values()
            .filter(|it| it.set_id == set_id && it.level == level)
            .cloned()
            .collect())
    }

    fn unlock_level(&self, user_id: UserId, set_id: SetId, level: u32) -> Result<usize> {
        let mut state = self.lock();
        state.set(set_id)?;
        let current = state.level_of(user_id, set_id)?;
        if level > current {
            return Err(QuizError::LevelNotReached {
                user_id,
                set_id,
                level,
                current,
            });
        }
        Ok(state.unlock_level(user_id, set_id, level))
    }

    fn unlock_set(&self, user_id: UserId, set_id: SetId) -> Result<usize> {
        let mut state = self.lock();
        state.set(set_id)?;
        if state.unlocked.contains_key(&(user_id, set_id)) {
            return Ok(0);
        }
        state.unlocked.insert((user_id, set_id), FIRST_LEVEL);
        let active = state.users.entry(user_id).or_insert(None);
        if active.is_none() {
            *active = Some(set_id);
        }
        Ok(state.unlock_level(user_id, set_id, FIRST_LEVEL))
    }

    fn advance_level(&self, user_id: UserId, set_id: SetId, new_level: u32) -> Result<usize> {
        let mut state = self.lock();
        let total_levels = state.set(set_id)?.total_levels;
        let current = state.level_of(user_id, set_id)?;
        if new_level <= current {
            return Err(QuizError::LevelRegression {
                user_id,
                set_id,
                current,
                requested: new_level,
            });
        }
        if new_level > total_levels {
            return Err(QuizError::LevelOutOfRange {
                set_id,
                level: new_level,
                total_levels,
            });
        }
        state.unlocked.insert((user_id, set_id), new_level);
        Ok(state.unlock_level(user_id, set_id, new_level))
    }

    fn active_set(&self, user_id: UserId) -> Result<SetId> {
        match self.lock().users.get(&user_id) {
            Some(Some(set_id)) => Ok(*set_id),
            Some(None) => Err(QuizError::NoActiveSet(user_id)),
            None => Err(QuizError::UnknownUser(user_id)),
        }
    }

    fn set_active_set(&self, user_id: UserId, set_id: SetId) -> Result<()> {
        let mut state = self.lock();
        state.level_of(user_id, set_id)?;
        state.users.insert(user_id, Some(set_id));
        Ok(())
    }

    fn current_level(&self, user_id: UserId, set_id: SetId) -> Result<u32> {
        self.lock().level_of(user_id, set_id)
    }

    fn total_levels(&self, set_id: SetId) -> Result<u32> {
        self.lock().set(set_id).map(|s| s.total_levels)
    }

    fn set_progress(&self, user_id: UserId) -> Result<Vec<UserSetProgress>> {
        let state = self.lock();
        if !state.users.contains_key(&user_id) {
            return Err(QuizError::UnknownUser(user_id));
        }
        Ok(state
            .unlocked
            .iter()
            .filter(|((uid, _), _)| *uid == user_id)
            .map(|(&(user_id, set_id), &current_level)| UserSetProgress {
                user_id,
                set_id,
                current_level,
            })
            .collect())
    }
}
