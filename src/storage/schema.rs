//! Dataset file schema
//!
//! A dataset file holds two tables: `dataset_meta` (key/value facts about the
//! file) and `records`, whose columns are the dataset's columns, declared
//! without a type so each cell keeps the storage class it was written with.

/// Version of the dataset file layout
pub const SCHEMA_VERSION: &str = "1";

/// SQL for the metadata table
pub const META_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS dataset_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Quotes an identifier for use in SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE records (...)` for the given columns
///
/// Returns `None` for an empty column set; SQLite tables need one column.
pub fn records_table_sql(columns: &[String]) -> Option<String> {
    if columns.is_empty() {
        return None;
    }
    let declared: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    Some(format!("CREATE TABLE records ({});", declared.join(", ")))
}

/// `INSERT INTO records (...) VALUES (?1, ...)` for the given columns
pub fn insert_sql(columns: &[String]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO records ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Initializes the metadata table
pub fn initialize_meta(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(META_SQL)
}
