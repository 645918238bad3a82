//! Catalog listing, seeding and example recording.

use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::Store;
use crate::classify::{CatalogEntry, ClassificationResult};
use crate::error::{StoreError, StoreResult};

/// A work to add to the catalog.
#[derive(Debug, Clone, Default)]
pub struct NewWork {
    pub title: String,
    /// Medium, e.g. "Novel" or "Film".
    pub kind: Option<String>,
    pub year: Option<i32>,
    pub author: Option<String>,
    pub description: Option<String>,
}

impl NewWork {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl Store {
    /// Up to `limit` tropes ordered by name, each with its first category.
    pub fn list_catalog(&self, limit: usize) -> StoreResult<Vec<CatalogEntry>> {
        let unavailable = |e: rusqlite::Error| StoreError::CatalogUnavailable {
            message: e.to_string(),
        };
        let mut stmt = self
            .conn
            .prepare(
                "SELECT t.name, COALESCE(t.description, ''),
                        (SELECT c.name FROM trope_categories tc
                           JOIN categories c ON c.id = tc.category_id
                          WHERE tc.trope_id = t.id
                          ORDER BY c.name LIMIT 1)
                   FROM tropes t
                  ORDER BY t.name COLLATE NOCASE
                  LIMIT ?1",
            )
            .map_err(unavailable)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let entries = stmt
            .query_map([limit], |row| {
                Ok(CatalogEntry {
                    name: row.get(0)?,
                    description: row.get(1)?,
                    category: row.get(2)?,
                })
            })
            .map_err(unavailable)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(unavailable)?;
        Ok(entries)
    }

    /// Add a trope, creating its category if needed. Returns the trope id.
    pub fn insert_trope(&mut self, entry: &CatalogEntry) -> StoreResult<String> {
        let tx = self.conn.transaction()?;
        let trope_id = new_id();
        tx.execute(
            "INSERT INTO tropes (id, name, description) VALUES (?1, ?2, ?3)",
            params![trope_id, entry.name.trim(), entry.description],
        )?;

        if let Some(category) = entry.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM categories WHERE name = ?1",
                    [category],
                    |row| row.get(0),
                )
                .optional()?;
            let category_id = match existing {
                Some(id) => id,
                None => {
                    let id = new_id();
                    tx.execute(
                        "INSERT INTO categories (id, name) VALUES (?1, ?2)",
                        params![id, category],
                    )?;
                    id
                }
            };
            tx.execute(
                "INSERT INTO trope_categories (trope_id, category_id) VALUES (?1, ?2)",
                params![trope_id, category_id],
            )?;
        }

        tx.commit()?;
        Ok(trope_id)
    }

    /// Add a work. Returns its id.
    pub fn insert_work(&mut self, work: &NewWork) -> StoreResult<String> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO works (id, title, type, year, author, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, work.title, work.kind, work.year, work.author, work.description],
        )?;
        Ok(id)
    }

    /// Record one example row per match, all or nothing. Returns the number
    /// of rows inserted.
    pub fn record_examples(
        &mut self,
        work_id: &str,
        description: &str,
        result: &ClassificationResult,
    ) -> StoreResult<usize> {
        let tx = self.conn.transaction()?;
        for name in result.names() {
            let trope_id: Option<String> = tx
                .query_row("SELECT id FROM tropes WHERE name = ?1", [name], |row| row.get(0))
                .optional()?;
            let Some(trope_id) = trope_id else {
                return Err(StoreError::UnknownTrope {
                    name: name.to_string(),
                });
            };
            tx.execute(
                "INSERT INTO examples (id, trope_id, work_id, description) VALUES (?1, ?2, ?3, ?4)",
                params![new_id(), trope_id, work_id, description],
            )?;
        }
        tx.commit()?;

        tracing::info!(work_id, examples = result.len(), "recorded trope examples");
        Ok(result.len())
    }

    /// Names of the tropes recorded for a work, ordered by name.
    pub fn tropes_for_work(&self, work_id: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name FROM examples e
               JOIN tropes t ON t.id = e.trope_id
              WHERE e.work_id = ?1
              ORDER BY t.name COLLATE NOCASE",
        )?;
        let names = stmt
            .query_map([work_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}
