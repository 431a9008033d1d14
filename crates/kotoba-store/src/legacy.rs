//! Migration of progress kept by the JSON-file prototype.
//!
//! The file maps user ids to named sets, each holding per-item counters
//! keyed by native form:
//!
//! ```json
//! { "1234": { "sets": { "hiragana": { "vocab": {
//!     "あ": { "times_correct": 3, "times_asked": 4, "familiarity": 2 }
//! } } } } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use kotoba_core::{Familiarity, ItemProgress, UserId, VocabRepository};

use crate::error::{Result, StoreError};
use crate::store::Store;

#[derive(Debug, Deserialize)]
struct LegacyUser {
    #[serde(default)]
    sets: BTreeMap<String, LegacySet>,
}

#[derive(Debug, Deserialize)]
struct LegacySet {
    #[serde(default)]
    vocab: BTreeMap<String, LegacyItem>,
}

#[derive(Debug, Deserialize)]
struct LegacyItem {
    #[serde(default)]
    times_correct: u32,
    #[serde(default)]
    times_asked: u32,
    #[serde(default)]
    familiarity: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyImportReport {
    pub users: usize,
    pub items: usize,
    pub skipped_users: usize,
    pub skipped_sets: usize,
    pub skipped_items: usize,
}

impl Store {
    pub fn import_legacy_file(&self, path: &Path) -> Result<LegacyImportReport> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_legacy_str(&json)
    }

    /// Unlock every named set up to the highest level seen among its
    /// imported items, then overwrite those items' counters. The whole file
    /// lands in one transaction.
    pub fn import_legacy_str(&self, json: &str) -> Result<LegacyImportReport> {
        let users: BTreeMap<String, LegacyUser> = serde_json::from_str(json)?;
        let report = self.atomically(|_| {
            let mut report = LegacyImportReport::default();

            for (key, user) in users {
                let Ok(user_id) = key.trim().parse::<UserId>() else {
                    tracing::warn!(user = %key, "skipping legacy user with non-numeric id");
                    report.skipped_users += 1;
                    continue;
                };
                self.ensure_user(user_id)?;
                report.users += 1;

                for (set_name, set) in &user.sets {
                    let Some(set_id) = self.find_set_by_name(set_name)? else {
                        tracing::warn!(user_id, set = %set_name, "skipping unknown legacy set");
                        report.skipped_sets += 1;
                        continue;
                    };

                    let mut resolved = Vec::with_capacity(set.vocab.len());
                    for (native, counters) in &set.vocab {
                        match self.find_vocab(set_id, native)? {
                            Some(item) => resolved.push((item, counters)),
                            None => {
                                tracing::warn!(user_id, set_id, native = %native, "skipping unknown legacy item");
                                report.skipped_items += 1;
                            }
                        }
                    }

                    self.unlock_set(user_id, set_id)?;
                    let target = resolved.iter().map(|(item, _)| item.level).max();
                    let current = self.current_level(user_id, set_id)?;
                    if let Some(target) = target {
                        for level in current + 1..=target {
                            self.advance_level(user_id, set_id, level)?;
                        }
                    }

                    for (item, counters) in resolved {
                        self.overwrite_item_progress(&ItemProgress {
                            user_id,
                            vocab_id: item.vocab_id,
                            familiarity: Familiarity::saturating(counters.familiarity),
                            times_shown: counters.times_asked,
                            times_correct: counters.times_correct,
                        })?;
                        report.items += 1;
                    }
                }
            }
            Ok(report)
        })?;

        tracing::info!(
            users = report.users,
            items = report.items,
            skipped = report.skipped_users + report.skipped_sets + report.skipped_items,
            "legacy progress imported"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .import_catalog_str(
                r#"{"sets": [{"id": 1, "name": "hiragana", "levels": [
                    [{"native": "あ", "romanization": "a"}, {"native": "い", "romanization": "i"}],
                    [{"native": "か", "romanization": "ka"}],
                    [{"native": "さ", "romanization": "sa"}]
                ]}]}"#,
            )
            .unwrap();
        store
    }

    #[test]
    fn test_import_overwrites_counters() {
        let store = store();
        let report = store
            .import_legacy_str(
                r#"{"42": {"sets": {"hiragana": {"vocab": {
                    "あ": {"times_correct": 3, "times_asked": 4, "familiarity": 2}
                }}}}}"#,
            )
            .unwrap();
        assert_eq!(report.users, 1);
        assert_eq!(report.items, 1);

        let row = store.item_progress(42, 1).unwrap();
        assert_eq!(row.familiarity.value(), 2);
        assert_eq!((row.times_shown, row.times_correct), (4, 3));
        assert_eq!(store.active_set(42).unwrap(), 1);
        assert_eq!(store.current_level(42, 1).unwrap(), 1);
    }

    #[test]
    fn test_import_raises_level_and_fills_gaps() {
        let store = store();
        store
            .import_legacy_str(
                r#"{"7": {"sets": {"hiragana": {"vocab": {
                    "さ": {"times_correct": 1, "times_asked": 1, "familiarity": 1}
                }}}}}"#,
            )
            .unwrap();
        assert_eq!(store.current_level(7, 1).unwrap(), 3);
        // Level 2 was skipped over in the file but still gets its row.
        assert_eq!(store.item_progress(7, 3).unwrap().times_shown, 0);
        assert_eq!(store.item_progress(7, 4).unwrap().familiarity.value(), 1);
    }

    #[test]
    fn test_familiarity_is_clamped() {
        let store = store();
        store
            .import_legacy_str(
                r#"{"7": {"sets": {"hiragana": {"vocab": {
                    "あ": {"times_correct": 30, "times_asked": 30, "familiarity": 15},
                    "い": {"times_correct": 0, "times_asked": 9, "familiarity": -3}
                }}}}}"#,
            )
            .unwrap();
        assert_eq!(store.familiarity(7, 1).unwrap(), Familiarity::MAX);
        assert_eq!(store.familiarity(7, 2).unwrap(), Familiarity::MIN);
    }

    #[test]
    fn test_unknowns_are_skipped() {
        let store = store();
        let report = store
            .import_legacy_str(
                r#"{
                    "abc": {"sets": {}},
                    "8": {"sets": {
                        "katakana": {"vocab": {"ア": {"times_correct": 1, "times_asked": 1, "familiarity": 1}}},
                        "hiragana": {"vocab": {"ん": {"times_correct": 1, "times_asked": 1, "familiarity": 1}}}
                    }}
                }"#,
            )
            .unwrap();
        assert_eq!(
            report,
            LegacyImportReport {
                users: 1,
                items: 0,
                skipped_users: 1,
                skipped_sets: 1,
                skipped_items: 1,
            }
        );
        assert_eq!(store.current_level(8, 1).unwrap(), 1);
    }

    #[test]
    fn test_reimport_keeps_level() {
        let store = store();
        let json = r#"{"9": {"sets": {"hiragana": {"vocab": {
            "か": {"times_correct": 2, "times_asked": 2, "familiarity": 2}
        }}}}}"#;
        store.import_legacy_str(json).unwrap();
        store.import_legacy_str(json).unwrap();
        assert_eq!(store.current_level(9, 1).unwrap(), 2);
        assert_eq!(store.item_progress(9, 3).unwrap().times_shown, 2);
    }

    #[test]
    fn test_failure_rolls_back_whole_file() {
        let store = store();
        // A level past the set's declared total makes the second user fail.
        store
            .conn()
            .execute_batch(
                "
                INSERT INTO sets (set_id, name, total_levels) VALUES (5, 'broken', 1);
                INSERT INTO vocab (vocab_id, native_form, romanization) VALUES (50, 'ぬ', 'nu');
                INSERT INTO set_vocab (vocab_id, set_id, level) VALUES (50, 5, 2);
                ",
            )
            .unwrap();

        let err = store
            .import_legacy_str(
                r#"{
                    "1": {"sets": {"hiragana": {"vocab": {"あ": {"times_correct": 2, "times_asked": 2, "familiarity": 2}}}}},
                    "2": {"sets": {"broken": {"vocab": {"ぬ": {"times_correct": 1, "times_asked": 1, "familiarity": 1}}}}}
                }"#,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Quiz(kotoba_core::QuizError::LevelOutOfRange { set_id: 5, .. })
        ));

        let stats = store.stats().unwrap();
        assert_eq!((stats.users, stats.tracked_items), (0, 0));
        assert!(store.item_progress(1, 1).is_err());

        // The connection is usable again afterwards.
        let report = store
            .import_legacy_str(
                r#"{"1": {"sets": {"hiragana": {"vocab": {"あ": {"times_correct": 2, "times_asked": 2, "familiarity": 2}}}}}}"#,
            )
            .unwrap();
        assert_eq!(report.items, 1);
        assert_eq!(store.familiarity(1, 1).unwrap().value(), 2);
    }
}
