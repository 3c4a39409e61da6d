//! Schema-aligned merge of a stored dataset with freshly fetched rows

use crate::storage::{Cell, Dataset};
use std::collections::HashMap;

/// Merges `incoming` into `existing`, keyed on the `key` column
///
/// The result's columns are the union of both inputs (existing order first);
/// rows missing a column get [`Cell::Null`]. Each identity appears once, and
/// an incoming row replaces the stored row with the same identity in place.
/// Rows with no identity are never dropped or merged.
///
/// Merging cannot fail: differing column sets are aligned, not rejected.
pub fn merge_with_schema_alignment(existing: Dataset, incoming: Dataset, key: &str) -> Dataset {
    let mut columns = existing.columns.clone();
    for column in &incoming.columns {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }

    let key_index = columns.iter().position(|c| c == key);
    let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(existing.rows.len() + incoming.rows.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for source in [existing, incoming] {
        let mapping: Vec<Option<usize>> = columns
            .iter()
            .map(|column| source.column_index(column))
            .collect();

        for row in source.rows {
            let aligned: Vec<Cell> = mapping
                .iter()
                .map(|index| index.map(|i| row[i].clone()).unwrap_or(Cell::Null))
                .collect();

            let identity = key_index.and_then(|i| aligned[i].identity());
            match identity {
                Some(identity) => match positions.get(&identity) {
                    Some(&position) => rows[position] = aligned,
                    None => {
                        positions.insert(identity, rows.len());
                        rows.push(aligned);
                    }
                },
                None => rows.push(aligned),
            }
        }
    }

    Dataset { columns, rows }
}
