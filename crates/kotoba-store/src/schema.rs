use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    // Fold any WAL left by a crashed process back into the main file.
    // In-memory and fresh databases legitimately fail this.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("startup WAL checkpoint complete");
    }

    // set_vocab is keyed by vocab_id alone: an item lives in exactly one
    // (set, level). user_vocab rows are only ever inserted, never deleted.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sets (
            set_id             INTEGER PRIMARY KEY,
            name               TEXT NOT NULL UNIQUE,
            total_levels       INTEGER NOT NULL CHECK (total_levels >= 1),
            unlock_description TEXT
        );

        CREATE TABLE IF NOT EXISTS vocab (
            vocab_id                INTEGER PRIMARY KEY AUTOINCREMENT,
            native_form             TEXT NOT NULL,
            romanization            TEXT NOT NULL,
            definition              TEXT,
            pronunciation_reference TEXT
        );

        CREATE TABLE IF NOT EXISTS set_vocab (
            vocab_id INTEGER PRIMARY KEY REFERENCES vocab(vocab_id),
            set_id   INTEGER NOT NULL REFERENCES sets(set_id),
            level    INTEGER NOT NULL CHECK (level >= 1)
        );

        CREATE TABLE IF NOT EXISTS users (
            user_id       INTEGER PRIMARY KEY,
            active_set_id INTEGER REFERENCES sets(set_id)
        );

        CREATE TABLE IF NOT EXISTS unlocked_sets (
            user_id       INTEGER NOT NULL REFERENCES users(user_id),
            set_id        INTEGER NOT NULL REFERENCES sets(set_id),
            current_level INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (user_id, set_id)
        );

        CREATE TABLE IF NOT EXISTS user_vocab (
            user_id       INTEGER NOT NULL REFERENCES users(user_id),
            vocab_id      INTEGER NOT NULL REFERENCES vocab(vocab_id),
            familiarity   INTEGER NOT NULL DEFAULT 0 CHECK (familiarity BETWEEN 0 AND 9),
            times_shown   INTEGER NOT NULL DEFAULT 0,
            times_correct INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (user_id, vocab_id)
        );

        CREATE INDEX IF NOT EXISTS idx_set_vocab_level ON set_vocab(set_id, level);
        CREATE INDEX IF NOT EXISTS idx_vocab_native ON vocab(native_form);
        CREATE INDEX IF NOT EXISTS idx_user_vocab_bucket ON user_vocab(user_id, familiarity);
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let version = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )
        .ok()
        .and_then(|v| v.parse().ok());
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, Some(SCHEMA_VERSION));

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        for expected in ["metadata", "sets", "set_vocab", "unlocked_sets", "user_vocab", "users", "vocab"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_busy_timeout_set() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 5000, "busy_timeout should be 5000ms");
    }

    #[test]
    fn test_familiarity_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute_batch(
            "
            INSERT INTO sets (set_id, name, total_levels) VALUES (1, 'hiragana', 1);
            INSERT INTO vocab (vocab_id, native_form, romanization) VALUES (1, 'あ', 'a');
            INSERT INTO set_vocab (vocab_id, set_id, level) VALUES (1, 1, 1);
            INSERT INTO users (user_id) VALUES (7);
            ",
        )
        .unwrap();

        let bad = conn.execute(
            "INSERT INTO user_vocab (user_id, vocab_id, familiarity) VALUES (7, 1, 10)",
            [],
        );
        assert!(bad.is_err(), "familiarity 10 must be rejected");
    }

    #[test]
    fn test_item_belongs_to_one_level() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute_batch(
            "
            INSERT INTO sets (set_id, name, total_levels) VALUES (1, 'hiragana', 2);
            INSERT INTO vocab (vocab_id, native_form, romanization) VALUES (1, 'あ', 'a');
            INSERT INTO set_vocab (vocab_id, set_id, level) VALUES (1, 1, 1);
            ",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO set_vocab (vocab_id, set_id, level) VALUES (1, 1, 2)",
            [],
        );
        assert!(dup.is_err());
    }
}
