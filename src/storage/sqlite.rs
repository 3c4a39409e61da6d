//! SQLite dataset files
//!
//! Each resource kind lives in its own database file under the data
//! directory. Writes go to a temporary file in the same directory, which is
//! renamed over the old file only after the transaction commits and the
//! connection closes.

use crate::model::ResourceKind;
use crate::storage::schema::{initialize_meta, insert_sql, records_table_sql, SCHEMA_VERSION};
use crate::storage::traits::{DatasetStore, StorageError, StorageResult};
use crate::storage::{Cell, Dataset};
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};

/// SQLite-backed dataset store
#[derive(Debug, Clone)]
pub struct SqliteDatasetStore {
    data_dir: PathBuf,
}

impl SqliteDatasetStore {
    /// Creates a store rooted at `data_dir`
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the dataset file for `kind`
    pub fn path_for(&self, kind: ResourceKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    /// Reads one metadata value from a stored dataset
    pub fn meta(&self, kind: ResourceKind, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(kind);
        if !path.exists() {
            return Ok(None);
        }
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let value = conn
            .query_row(
                "SELECT value FROM dataset_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_into(conn: &mut Connection, kind: ResourceKind, dataset: &Dataset) -> StorageResult<()> {
        // Rollback journal only: the file must be self-contained when renamed
        conn.execute_batch("PRAGMA journal_mode = DELETE;")?;

        let tx = conn.transaction()?;
        initialize_meta(&tx)?;

        let now = Utc::now().to_rfc3339();
        let row_count = dataset.len().to_string();
        for (key, value) in [
            ("schema_version", SCHEMA_VERSION),
            ("kind", kind.to_db_string()),
            ("identity_key", kind.identity_key()),
            ("written_at", now.as_str()),
            ("row_count", row_count.as_str()),
        ] {
            tx.execute(
                "INSERT OR REPLACE INTO dataset_meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }

        if let Some(create) = records_table_sql(&dataset.columns) {
            tx.execute_batch(&create)?;
            let mut stmt = tx.prepare(&insert_sql(&dataset.columns))?;
            for row in &dataset.rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

impl DatasetStore for SqliteDatasetStore {
    fn load(&self, kind: ResourceKind) -> StorageResult<Option<Dataset>> {
        let path = self.path_for(kind);
        if !path.exists() {
            return Ok(None);
        }

        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        let has_records: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'records'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if has_records.is_none() {
            return Ok(Some(Dataset::new()));
        }

        let mut stmt = conn.prepare("SELECT * FROM records ORDER BY rowid")?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Cell>(i))
                    .collect::<rusqlite::Result<Vec<Cell>>>()
            })?
            .collect::<rusqlite::Result<Vec<Vec<Cell>>>>()?;

        tracing::debug!("Loaded {} rows from {}", rows.len(), path.display());
        Ok(Some(Dataset { columns, rows }))
    }

    fn write(&self, kind: ResourceKind, dataset: &Dataset) -> StorageResult<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let target = self.path_for(kind);

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", kind.to_db_string()))
            .suffix(".tmp")
            .tempfile_in(&self.data_dir)?;

        let mut conn = Connection::open(temp.path())?;
        Self::write_into(&mut conn, kind, dataset)?;
        conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;

        temp.persist(&target).map_err(|e| StorageError::Persist {
            path: target.clone(),
            source: e.error,
        })?;

        tracing::debug!("Wrote {} rows to {}", dataset.len(), target.display());
        Ok(())
    }
}
