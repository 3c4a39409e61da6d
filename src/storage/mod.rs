//! Storage module for persisting harvested datasets
//!
//! This module handles everything between mapped records and disk:
//! - Row and cell values produced by the record mapper
//! - Schema-aligned merging of stored and freshly fetched rows
//! - One SQLite file per resource kind, replaced atomically on every write

mod merge;
mod row;
mod schema;
mod sqlite;
mod traits;

pub use merge::merge_with_schema_alignment;
pub use row::{Cell, Row, ToRow};
pub use sqlite::SqliteDatasetStore;
pub use traits::{DatasetStore, PersistOutcome, StorageError, StorageResult};

use std::path::Path;

/// Opens the dataset store rooted at `data_dir`
///
/// The directory is created on the first write, not here.
pub fn open_store(data_dir: &Path) -> SqliteDatasetStore {
    SqliteDatasetStore::new(data_dir)
}

/// A table of rows sharing one column set
///
/// Every row has exactly `columns.len()` cells; columns a record lacks hold
/// [`Cell::Null`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<Vec<Cell>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dataset whose columns are the union of the rows' columns,
    /// in first-seen order
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let rows: Vec<&Row> = rows.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for column in row.columns() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }

        let rows = rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or(Cell::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cell at `row` in `column`, if both exist
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(index))
    }

    /// Identity of every row under `key`, `None` for rows without one
    pub fn identities(&self, key: &str) -> Vec<Option<String>> {
        match self.column_index(key) {
            Some(index) => self.rows.iter().map(|row| row[index].identity()).collect(),
            None => vec![None; self.rows.len()],
        }
    }

    /// Looks up the first row whose `key` column has the given identity
    pub fn find(&self, key: &str, identity: &str) -> Option<&[Cell]> {
        let index = self.column_index(key)?;
        self.rows
            .iter()
            .find(|row| row[index].identity().as_deref() == Some(identity))
            .map(Vec::as_slice)
    }
}
