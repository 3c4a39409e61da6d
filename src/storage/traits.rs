//! Storage traits and error types

use crate::model::{PersistMode, ResourceKind};
use crate::storage::{merge_with_schema_alignment, Dataset, Row};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or writing a dataset
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What a persist call did to one dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub mode: PersistMode,
    /// Rows handed to the store
    pub incoming: usize,
    /// Rows in the file after the write
    pub total: usize,
}

/// Trait for dataset backends
///
/// A write replaces the whole dataset or leaves the stored one untouched.
pub trait DatasetStore {
    /// Loads the stored dataset for `kind`, `None` if nothing has been written
    fn load(&self, kind: ResourceKind) -> StorageResult<Option<Dataset>>;

    /// Atomically replaces the stored dataset for `kind`
    fn write(&self, kind: ResourceKind, dataset: &Dataset) -> StorageResult<()>;

    /// Stores freshly mapped rows for `kind`
    ///
    /// Snapshot kinds replace the stored file; the others are merged with it
    /// on the kind's identity column.
    fn persist(&self, kind: ResourceKind, rows: &[Row]) -> StorageResult<PersistOutcome> {
        let incoming = Dataset::from_rows(rows);
        let mode = kind.persist_mode();

        let dataset = match mode {
            PersistMode::Replace => incoming,
            PersistMode::Merge => {
                let existing = self.load(kind)?.unwrap_or_default();
                merge_with_schema_alignment(existing, incoming, kind.identity_key())
            }
        };

        self.write(kind, &dataset)?;

        Ok(PersistOutcome {
            mode,
            incoming: rows.len(),
            total: dataset.len(),
        })
    }
}
