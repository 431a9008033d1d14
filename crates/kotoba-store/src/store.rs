use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};

use kotoba_core::{
    BUCKET_COUNT, Familiarity, FIRST_LEVEL, ItemProgress, QuizError, SetId, UserId,
    UserSetProgress, VocabId, VocabRepository, VocabSet, VocabularyItem,
};

use crate::error::{Result, StoreError};
use crate::schema;

const ITEM_COLUMNS: &str = "v.vocab_id, sv.set_id, sv.level, v.native_form, v.romanization,
     v.definition, v.pronunciation_reference";

pub struct Store {
    conn: Connection,
}

/// A catalog set together with how many items it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSummary {
    pub set: VocabSet,
    pub item_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub sets: usize,
    pub vocab: usize,
    pub users: usize,
    pub tracked_items: usize,
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<VocabularyItem> {
    Ok(VocabularyItem {
        vocab_id: row.get(0)?,
        set_id: row.get(1)?,
        level: row.get(2)?,
        native_form: row.get(3)?,
        romanization: row.get(4)?,
        definition: row.get(5)?,
        pronunciation_reference: row.get(6)?,
    })
}

fn familiarity_from(value: u8) -> Result<Familiarity> {
    Familiarity::new(value)
        .ok_or_else(|| StoreError::InvalidData(format!("familiarity {value} out of range")))
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Catalog ---

    pub fn get_set(&self, set_id: SetId) -> Result<VocabSet> {
        self.conn
            .query_row(
                "SELECT set_id, name, total_levels, unlock_description FROM sets WHERE set_id = ?1",
                [set_id],
                |row| {
                    Ok(VocabSet {
                        set_id: row.get(0)?,
                        name: row.get(1)?,
                        total_levels: row.get(2)?,
                        unlock_description: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or(StoreError::Quiz(QuizError::UnknownSet(set_id)))
    }

    pub fn find_set_by_name(&self, name: &str) -> Result<Option<SetId>> {
        let id = self
            .conn
            .query_row("SELECT set_id FROM sets WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    pub fn list_sets(&self) -> Result<Vec<SetSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.set_id, s.name, s.total_levels, s.unlock_description,
                    (SELECT COUNT(*) FROM set_vocab sv WHERE sv.set_id = s.set_id)
             FROM sets s ORDER BY s.set_id",
        )?;
        let sets = stmt
            .query_map([], |row| {
                Ok(SetSummary {
                    set: VocabSet {
                        set_id: row.get(0)?,
                        name: row.get(1)?,
                        total_levels: row.get(2)?,
                        unlock_description: row.get(3)?,
                    },
                    item_count: row.get::<_, i64>(4)? as usize,
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(sets)
    }

    /// Every item in a set, ordered by level then id.
    pub fn items_in_set(&self, set_id: SetId) -> Result<Vec<VocabularyItem>> {
        self.get_set(set_id)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM vocab v JOIN set_vocab sv ON sv.vocab_id = v.vocab_id
             WHERE sv.set_id = ?1 ORDER BY sv.level, v.vocab_id"
        ))?;
        let items = stmt
            .query_map([set_id], item_from_row)?
            .collect::<std::result::Result<_, _>>()?;
        Ok(items)
    }

    pub fn get_vocab(&self, vocab_id: VocabId) -> Result<Option<VocabularyItem>> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM vocab v JOIN set_vocab sv ON sv.vocab_id = v.vocab_id
                     WHERE v.vocab_id = ?1"
                ),
                [vocab_id],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Look an item up by its native form within one set.
    pub fn find_vocab(&self, set_id: SetId, native_form: &str) -> Result<Option<VocabularyItem>> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM vocab v JOIN set_vocab sv ON sv.vocab_id = v.vocab_id
                     WHERE sv.set_id = ?1 AND v.native_form = ?2"
                ),
                params![set_id, native_form],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    // --- Users ---

    /// Create the user if missing. Returns whether a row was inserted.
    pub fn ensure_user(&self, user_id: UserId) -> Result<bool> {
        let inserted = self
            .conn
            .execute("INSERT OR IGNORE INTO users (user_id) VALUES (?1)", [user_id])?;
        Ok(inserted > 0)
    }

    fn require_user(&self, user_id: UserId) -> Result<()> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1)",
            [user_id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(QuizError::UnknownUser(user_id).into())
        }
    }

    fn load_current_level(&self, user_id: UserId, set_id: SetId) -> Result<u32> {
        self.conn
            .query_row(
                "SELECT current_level FROM unlocked_sets WHERE user_id = ?1 AND set_id = ?2",
                [user_id, set_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::Quiz(QuizError::SetNotUnlocked { user_id, set_id }))
    }

    fn load_item_progress(&self, user_id: UserId, vocab_id: VocabId) -> Result<ItemProgress> {
        let row: Option<(u8, u32, u32)> = self
            .conn
            .query_row(
                "SELECT familiarity, times_shown, times_correct FROM user_vocab
                 WHERE user_id = ?1 AND vocab_id = ?2",
                [user_id, vocab_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (familiarity, times_shown, times_correct) =
            row.ok_or(StoreError::Quiz(QuizError::UnknownProgress { user_id, vocab_id }))?;
        Ok(ItemProgress {
            user_id,
            vocab_id,
            familiarity: familiarity_from(familiarity)?,
            times_shown,
            times_correct,
        })
    }

    /// Overwrite one tracking row wholesale. Used when migrating progress
    /// recorded elsewhere; the row must already exist.
    pub fn overwrite_item_progress(&self, progress: &ItemProgress) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE user_vocab SET familiarity = ?3, times_shown = ?4, times_correct = ?5
             WHERE user_id = ?1 AND vocab_id = ?2",
            params![
                progress.user_id,
                progress.vocab_id,
                progress.familiarity.value(),
                progress.times_shown,
                progress.times_correct,
            ],
        )?;
        if changed == 0 {
            return Err(QuizError::UnknownProgress {
                user_id: progress.user_id,
                vocab_id: progress.vocab_id,
            }
            .into());
        }
        Ok(())
    }

    fn insert_level_rows(
        conn: &Connection,
        user_id: UserId,
        set_id: SetId,
        level: u32,
    ) -> Result<usize> {
        let created = conn.execute(
            "INSERT OR IGNORE INTO user_vocab (user_id, vocab_id)
             SELECT ?1, vocab_id FROM set_vocab WHERE set_id = ?2 AND level = ?3",
            params![user_id, set_id, level],
        )?;
        Ok(created)
    }

    /// Run `f` inside a transaction. When the connection is already inside
    /// one, `f` joins it and the outer caller decides whether to commit.
    pub(crate) fn atomically<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return f(&self.conn);
        }
        let tx = self.conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn unlock_set_tx(&self, user_id: UserId, set_id: SetId) -> Result<usize> {
        self.get_set(set_id)?;
        self.atomically(|tx| {
            tx.execute("INSERT OR IGNORE INTO users (user_id) VALUES (?1)", [user_id])?;
            let fresh = tx.execute(
                "INSERT OR IGNORE INTO unlocked_sets (user_id, set_id, current_level) VALUES (?1, ?2, ?3)",
                params![user_id, set_id, FIRST_LEVEL],
            )?;
            if fresh == 0 {
                return Ok(0);
            }
            tx.execute(
                "UPDATE users SET active_set_id = ?2 WHERE user_id = ?1 AND active_set_id IS NULL",
                [user_id, set_id],
            )?;
            Self::insert_level_rows(tx, user_id, set_id, FIRST_LEVEL)
        })
    }

    fn advance_level_tx(&self, user_id: UserId, set_id: SetId, new_level: u32) -> Result<usize> {
        let total_levels = self.get_set(set_id)?.total_levels;
        self.atomically(|tx| {
            let current = self.load_current_level(user_id, set_id)?;
            if new_level <= current {
                return Err(QuizError::LevelRegression {
                    user_id,
                    set_id,
                    current,
                    requested: new_level,
                }
                .into());
            }
            if new_level > total_levels {
                return Err(QuizError::LevelOutOfRange {
                    set_id,
                    level: new_level,
                    total_levels,
                }
                .into());
            }
            tx.execute(
                "UPDATE unlocked_sets SET current_level = ?3
                 WHERE user_id = ?1 AND set_id = ?2 AND current_level < ?3",
                params![user_id, set_id, new_level],
            )?;
            Self::insert_level_rows(tx, user_id, set_id, new_level)
        })
    }

    /// Count of tracking rows per familiarity bucket for one set.
    pub fn familiarity_histogram(
        &self,
        user_id: UserId,
        set_id: SetId,
    ) -> Result<[usize; BUCKET_COUNT]> {
        let mut stmt = self.conn.prepare(
            "SELECT uv.familiarity, COUNT(*) FROM user_vocab uv
             JOIN set_vocab sv ON sv.vocab_id = uv.vocab_id
             WHERE uv.user_id = ?1 AND sv.set_id = ?2
             GROUP BY uv.familiarity",
        )?;
        let mut histogram = [0usize; BUCKET_COUNT];
        let rows = stmt.query_map([user_id, set_id], |row| {
            Ok((row.get::<_, u8>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (familiarity, count) = row?;
            histogram[familiarity_from(familiarity)?.bucket()] = count as usize;
        }
        Ok(histogram)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            sets: count("sets")?,
            vocab: count("vocab")?,
            users: count("users")?,
            tracked_items: count("user_vocab")?,
        })
    }
}

impl VocabRepository for Store {
    fn familiarity(&self, user_id: UserId, vocab_id: VocabId) -> kotoba_core::Result<Familiarity> {
        Ok(self.load_item_progress(user_id, vocab_id)?.familiarity)
    }

    fn item_progress(
        &self,
        user_id: UserId,
        vocab_id: VocabId,
    ) -> kotoba_core::Result<ItemProgress> {
        Ok(self.load_item_progress(user_id, vocab_id)?)
    }

    fn record_familiarity(
        &self,
        user_id: UserId,
        vocab_id: VocabId,
        value: Familiarity,
        correct: bool,
    ) -> kotoba_core::Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE user_vocab
                 SET familiarity = ?3,
                     times_shown = times_shown + 1,
                     times_correct = times_correct + ?4
                 WHERE user_id = ?1 AND vocab_id = ?2",
                params![user_id, vocab_id, value.value(), correct as i64],
            )
            .map_err(StoreError::from)?;
        if changed == 0 {
            return Err(QuizError::UnknownProgress { user_id, vocab_id });
        }
        Ok(())
    }

    fn items_by_bucket(
        &self,
        user_id: UserId,
        set_id: SetId,
        bucket: Familiarity,
    ) -> kotoba_core::Result<Vec<VocabularyItem>> {
        let level = self.load_current_level(user_id, set_id)?;
        let query = || -> Result<Vec<VocabularyItem>> {
            let mut stmt = self.conn.prepare_cached(&format!(
                "SELECT {ITEM_COLUMNS} FROM user_vocab uv
                 JOIN set_vocab sv ON sv.vocab_id = uv.vocab_id
                 JOIN vocab v ON v.vocab_id = uv.vocab_id
                 WHERE uv.user_id = ?1 AND sv.set_id = ?2 AND uv.familiarity = ?3
                   AND sv.level <= ?4
                 ORDER BY v.vocab_id"
            ))?;
            let items = stmt
                .query_map(params![user_id, set_id, bucket.value(), level], item_from_row)?
                .collect::<std::result::Result<_, _>>()?;
            Ok(items)
        };
        Ok(query()?)
    }

    fn items_at_level(&self, set_id: SetId, level: u32) -> kotoba_core::Result<Vec<VocabularyItem>> {
        self.get_set(set_id)?;
        let query = || -> Result<Vec<VocabularyItem>> {
            let mut stmt = self.conn.prepare_cached(&format!(
                "SELECT {ITEM_COLUMNS} FROM vocab v JOIN set_vocab sv ON sv.vocab_id = v.vocab_id
                 WHERE sv.set_id = ?1 AND sv.level = ?2 ORDER BY v.vocab_id"
            ))?;
            let items = stmt
                .query_map(params![set_id, level], item_from_row)?
                .collect::<std::result::Result<_, _>>()?;
            Ok(items)
        };
        Ok(query()?)
    }

    fn unlock_level(&self, user_id: UserId, set_id: SetId, level: u32) -> kotoba_core::Result<usize> {
        self.get_set(set_id)?;
        let current = self.load_current_level(user_id, set_id)?;
        if level > current {
            return Err(QuizError::LevelNotReached {
                user_id,
                set_id,
                level,
                current,
            });
        }
        Ok(Self::insert_level_rows(&self.conn, user_id, set_id, level)?)
    }

    fn unlock_set(&self, user_id: UserId, set_id: SetId) -> kotoba_core::Result<usize> {
        Ok(self.unlock_set_tx(user_id, set_id)?)
    }

    fn advance_level(
        &self,
        user_id: UserId,
        set_id: SetId,
        new_level: u32,
    ) -> kotoba_core::Result<usize> {
        Ok(self.advance_level_tx(user_id, set_id, new_level)?)
    }

    fn active_set(&self, user_id: UserId) -> kotoba_core::Result<SetId> {
        let row: Option<Option<SetId>> = self
            .conn
            .query_row(
                "SELECT active_set_id FROM users WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)?;
        match row {
            Some(Some(set_id)) => Ok(set_id),
            Some(None) => Err(QuizError::NoActiveSet(user_id)),
            None => Err(QuizError::UnknownUser(user_id)),
        }
    }

    fn set_active_set(&self, user_id: UserId, set_id: SetId) -> kotoba_core::Result<()> {
        self.load_current_level(user_id, set_id)?;
        self.conn
            .execute(
                "UPDATE users SET active_set_id = ?2 WHERE user_id = ?1",
                [user_id, set_id],
            )
            .map_err(StoreError::from)?;
        tracing::info!(user_id, set_id, "active set changed");
        Ok(())
    }

    fn current_level(&self, user_id: UserId, set_id: SetId) -> kotoba_core::Result<u32> {
        Ok(self.load_current_level(user_id, set_id)?)
    }

    fn total_levels(&self, set_id: SetId) -> kotoba_core::Result<u32> {
        Ok(self.get_set(set_id)?.total_levels)
    }

    fn set_progress(&self, user_id: UserId) -> kotoba_core::Result<Vec<UserSetProgress>> {
        self.require_user(user_id)?;
        let query = || -> Result<Vec<UserSetProgress>> {
            let mut stmt = self.conn.prepare(
                "SELECT set_id, current_level FROM unlocked_sets WHERE user_id = ?1 ORDER BY set_id",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(UserSetProgress {
                        user_id,
                        set_id: row.get(0)?,
                        current_level: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<_, _>>()?;
            Ok(rows)
        };
        Ok(query()?)
    }
}
