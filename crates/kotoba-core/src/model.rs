use serde::{Deserialize, Serialize};

use crate::familiarity::Familiarity;

pub type UserId = i64;
pub type SetId = i64;
pub type VocabId = i64;

/// One askable vocabulary entry. Immutable once it is in the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyItem {
    pub vocab_id: VocabId,
    pub set_id: SetId,
    pub level: u32,
    pub native_form: String,
    pub romanization: String,
    pub definition: Option<String>,
    pub pronunciation_reference: Option<String>,
}

impl VocabularyItem {
    /// Whether `answer` matches the romanization.
    ///
    /// Comparison is trimmed and ASCII case-insensitive. A romanization may
    /// list alternatives separated by `/` (`shi/si`); any one of them counts.
    pub fn accepts(&self, answer: &str) -> bool {
        let answer = answer.trim();
        if answer.is_empty() {
            return false;
        }
        self.romanization
            .split('/')
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .any(|alt| alt.eq_ignore_ascii_case(answer))
    }
}

/// A themed collection of items split into ordered levels `1..=total_levels`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabSet {
    pub set_id: SetId,
    pub name: String,
    pub total_levels: u32,
    pub unlock_description: Option<String>,
}

/// Where a learner stands in one unlocked set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSetProgress {
    pub user_id: UserId,
    pub set_id: SetId,
    pub current_level: u32,
}

/// Per-user, per-item tracking row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProgress {
    pub user_id: UserId,
    pub vocab_id: VocabId,
    pub familiarity: Familiarity,
    pub times_shown: u32,
    pub times_correct: u32,
}

impl ItemProgress {
    /// Fresh row created on unlock.
    pub fn new(user_id: UserId, vocab_id: VocabId) -> Self {
        Self {
            user_id,
            vocab_id,
            familiarity: Familiarity::MIN,
            times_shown: 0,
            times_correct: 0,
        }
    }

    /// Apply one answer: bump counters and move familiarity.
    pub fn record(&mut self, familiarity: Familiarity, correct: bool) {
        self.times_shown += 1;
        if correct {
            self.times_correct += 1;
        }
        self.familiarity = familiarity;
    }
}
