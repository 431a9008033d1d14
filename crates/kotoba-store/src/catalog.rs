use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rusqlite::params;
use serde::{Deserialize, Serialize};

use kotoba_core::SetId;

use crate::error::{Result, StoreError};
use crate::store::Store;

/// On-disk catalog: sets of items grouped into levels. Level numbers are
/// positional, the first inner list being level 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub sets: Vec<CatalogSet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSet {
    pub id: SetId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_description: Option<String>,
    pub levels: Vec<Vec<CatalogItem>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub native: String,
    pub romanization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogImport {
    pub sets: usize,
    pub items: usize,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for set in &self.sets {
            if !ids.insert(set.id) {
                return Err(StoreError::InvalidData(format!(
                    "set id {} appears twice in catalog",
                    set.id
                )));
            }
            if set.levels.is_empty() {
                return Err(StoreError::InvalidData(format!(
                    "set {} ({}) has no levels",
                    set.id, set.name
                )));
            }
            if let Some(pos) = set.levels.iter().position(Vec::is_empty) {
                return Err(StoreError::InvalidData(format!(
                    "set {} ({}) level {} is empty",
                    set.id,
                    set.name,
                    pos + 1
                )));
            }
        }
        Ok(())
    }
}

impl Store {
    /// Import a catalog JSON file.
    pub fn import_catalog_file(&self, path: &Path) -> Result<CatalogImport> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_catalog_str(&json)
    }

    pub fn import_catalog_str(&self, json: &str) -> Result<CatalogImport> {
        let catalog = Catalog::from_json(json)?;
        self.import_catalog(&catalog)
    }

    /// Insert every set and item in one transaction. A set id that is
    /// already stored aborts the whole import.
    pub fn import_catalog(&self, catalog: &Catalog) -> Result<CatalogImport> {
        catalog.validate()?;
        let tx = self.conn().unchecked_transaction()?;
        let mut counts = CatalogImport::default();

        for set in &catalog.sets {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM sets WHERE set_id = ?1)",
                [set.id],
                |row| row.get(0),
            )?;
            if exists {
                return Err(StoreError::InvalidData(format!(
                    "set {} already exists",
                    set.id
                )));
            }

            tx.execute(
                "INSERT INTO sets (set_id, name, total_levels, unlock_description)
                 VALUES (?1, ?2, ?3, ?4)",
                params![set.id, set.name, set.levels.len() as u32, set.unlock_description],
            )?;

            for (i, level) in set.levels.iter().enumerate() {
                let level_number = i as u32 + 1;
                for item in level {
                    tx.execute(
                        "INSERT INTO vocab (native_form, romanization, definition, pronunciation_reference)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![item.native, item.romanization, item.definition, item.pronunciation],
                    )?;
                    let vocab_id = tx.last_insert_rowid();
                    tx.execute(
                        "INSERT INTO set_vocab (vocab_id, set_id, level) VALUES (?1, ?2, ?3)",
                        params![vocab_id, set.id, level_number],
                    )?;
                    counts.items += 1;
                }
            }
            counts.sets += 1;
        }

        tx.commit()?;
        tracing::info!(sets = counts.sets, items = counts.items, "catalog imported");
        Ok(counts)
    }
}
