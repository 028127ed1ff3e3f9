//! SQLite-backed document store.
//!
//! Documents live as JSON in `well_documents`, one row per key. Writes run
//! in an IMMEDIATE transaction so the read-compare-write of an upsert holds
//! the write lock throughout.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::error::StoreError;
use super::traits::DocumentStore;
use super::types::{DocumentFilter, WellDocument, WriteOutcome, KEY_FIELD};
use crate::db;

pub struct SqliteDocumentStore {
    conn: Connection,
}

impl SqliteDocumentStore {
    /// Open (or create) the store at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            conn: db::open_database(path)?,
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: db::open_memory_database()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn valid_field(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl DocumentStore for SqliteDocumentStore {
    fn ensure_unique_index(&self, field: &str) -> Result<(), StoreError> {
        if !valid_field(field) {
            return Err(StoreError::InvalidField(field.to_string()));
        }
        let sql = if field == KEY_FIELD {
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_well_documents_key ON well_documents(well_id)"
                .to_string()
        } else {
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_well_documents_{field}
                 ON well_documents(json_extract(document, '$.{field}'))"
            )
        };
        self.conn.execute_batch(&sql)?;
        tracing::debug!(field, "Unique index ensured");
        Ok(())
    }

    fn update_or_insert(
        &self,
        key: &str,
        document: &WellDocument,
    ) -> Result<WriteOutcome, StoreError> {
        let new_value = serde_json::to_value(document)?;
        let json = new_value.to_string();
        let now = Utc::now().to_rfc3339();

        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let prior: Option<String> = tx
            .query_row(
                "SELECT document FROM well_documents WHERE well_id = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match prior {
            None => {
                tx.execute(
                    "INSERT INTO well_documents (well_id, document, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)",
                    params![key, json, now],
                )?;
                WriteOutcome::Inserted
            }
            Some(stored) => {
                let unchanged = serde_json::from_str::<serde_json::Value>(&stored)
                    .map(|v| v == new_value)
                    .unwrap_or(false);
                if unchanged {
                    WriteOutcome::Unchanged
                } else {
                    tx.execute(
                        "UPDATE well_documents SET document = ?2, updated_at = ?3
                         WHERE well_id = ?1",
                        params![key, json, now],
                    )?;
                    WriteOutcome::Modified
                }
            }
        };
        tx.commit()?;
        Ok(outcome)
    }

    fn count(&self, filter: &DocumentFilter) -> Result<usize, StoreError> {
        let count: i64 = match filter {
            DocumentFilter::All => {
                self.conn
                    .query_row("SELECT COUNT(*) FROM well_documents", [], |row| row.get(0))?
            }
            DocumentFilter::HasField(field) => {
                if !valid_field(field) {
                    return Err(StoreError::InvalidField(field.clone()));
                }
                self.conn.query_row(
                    "SELECT COUNT(*) FROM well_documents
                     WHERE json_extract(document, ?1) IS NOT NULL",
                    params![format!("$.{field}")],
                    |row| row.get(0),
                )?
            }
        };
        Ok(count as usize)
    }

    fn sample(&self, limit: usize) -> Result<Vec<WellDocument>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT document FROM well_documents ORDER BY well_id LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(serde_json::from_str(&row?)?);
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn doc(id: &str, january: Option<f64>) -> WellDocument {
        let mut levels = BTreeMap::new();
        if let Some(v) = january {
            levels.insert("january".to_string(), v);
        }
        WellDocument {
            well_id: id.into(),
            village: "Annur".into(),
            latitude: 11.02,
            longitude: 76.95,
            coordinates: [Some(11.02), Some(76.95)],
            block: None,
            levels,
        }
    }

    fn store() -> SqliteDocumentStore {
        let s = SqliteDocumentStore::in_memory().unwrap();
        s.ensure_unique_index(KEY_FIELD).unwrap();
        s
    }

    #[test]
    fn insert_then_unchanged_then_modified() {
        let s = store();
        let write = |jan| s.update_or_insert("W1", &doc("W1", Some(jan))).unwrap();
        assert_eq!(write(5.2), WriteOutcome::Inserted);
        assert_eq!(write(5.2), WriteOutcome::Unchanged);
        assert_eq!(write(5.9), WriteOutcome::Modified);
        assert_eq!(s.count(&DocumentFilter::All).unwrap(), 1);
        assert_eq!(s.sample(5).unwrap()[0].levels["january"], 5.9);
    }

    #[test]
    fn overwrite_replaces_whole_document() {
        let s = store();
        s.update_or_insert("W1", &doc("W1", Some(5.2))).unwrap();
        s.update_or_insert("W1", &doc("W1", None)).unwrap();
        assert_eq!(s.count(&DocumentFilter::HasField("january".into())).unwrap(), 0);
    }

    #[test]
    fn unique_index_rejects_duplicate_rows() {
        let s = store();
        s.update_or_insert("W1", &doc("W1", None)).unwrap();
        let dup = s.connection().execute(
            "INSERT INTO well_documents (well_id, document, created_at, updated_at)
             VALUES ('W1', '{}', 'x', 'x')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn ensure_index_is_idempotent_and_validates() {
        let s = store();
        s.ensure_unique_index(KEY_FIELD).unwrap();
        assert!(matches!(
            s.ensure_unique_index("x; DROP TABLE well_documents"),
            Err(StoreError::InvalidField(_))
        ));
    }

    #[test]
    fn count_and_sample() {
        let s = store();
        for (id, jan) in [("W3", Some(1.0)), ("W1", None), ("W2", Some(2.0)), ("W4", None)] {
            s.update_or_insert(id, &doc(id, jan)).unwrap();
        }
        assert_eq!(s.count(&DocumentFilter::All).unwrap(), 4);
        assert_eq!(s.count(&DocumentFilter::HasField("january".into())).unwrap(), 2);

        let sample = s.sample(3).unwrap();
        let ids: Vec<&str> = sample.iter().map(|d| d.well_id.as_str()).collect();
        assert_eq!(ids, vec!["W1", "W2", "W3"]);
    }

    #[test]
    fn file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("wells.db");
        {
            let s = SqliteDocumentStore::open(&path).unwrap();
            s.ensure_unique_index(KEY_FIELD).unwrap();
            s.update_or_insert("W1", &doc("W1", Some(3.0))).unwrap();
        }
        let s = SqliteDocumentStore::open(&path).unwrap();
        assert_eq!(s.count(&DocumentFilter::All).unwrap(), 1);
    }
}
