//! SQLite-backed tabular source.

use super::{quote_identifier, TabularSource};
use crate::data::{Cell, Table};
use crate::errors::PipelineError;
use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads and writes tables in a SQLite database file.
///
/// Each call opens its own connection on a blocking thread.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Creates a store for the database at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TabularSource for SqliteStore {
    async fn fetch_table(&self, table: &str) -> Result<Table, PipelineError> {
        let path = self.path.clone();
        let query = format!("SELECT * FROM {}", quote_identifier(table));
        debug!(db = %path.display(), %query, "Fetching table");

        tokio::task::spawn_blocking(move || {
            let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
            read_query(&conn, &query)
        })
        .await
        .map_err(|e| PipelineError::Source(format!("SQLite task join error: {e}")))?
    }

    async fn replace_table(&self, table: &str, data: &Table) -> Result<(), PipelineError> {
        let path = self.path.clone();
        let table = table.to_string();
        let data = data.clone();
        debug!(db = %path.display(), %table, rows = data.n_rows(), "Replacing table");

        tokio::task::spawn_blocking(move || {
            let mut conn = Connection::open(&path)?;
            write_table(&mut conn, &table, &data)
        })
        .await
        .map_err(|e| PipelineError::Source(format!("SQLite task join error: {e}")))?
    }
}

fn read_query(conn: &Connection, query: &str) -> Result<Table, PipelineError> {
    let mut stmt = conn.prepare(query)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let column_count = columns.len();

    let mut table = Table::new(columns);
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(column_count);
        for i in 0..column_count {
            #[allow(clippy::cast_precision_loss)]
            let cell = match row.get_ref(i)? {
                ValueRef::Null => Cell::Missing,
                ValueRef::Integer(n) => Cell::Number(n as f64),
                ValueRef::Real(f) => Cell::from(f),
                ValueRef::Text(t) => Cell::parse(&String::from_utf8_lossy(t)),
                ValueRef::Blob(_) => Cell::Text("<blob>".to_string()),
            };
            cells.push(cell);
        }
        table.push_row(cells)?;
    }
    Ok(table)
}

fn write_table(conn: &mut Connection, table: &str, data: &Table) -> Result<(), PipelineError> {
    let name = quote_identifier(table);
    let column_defs: Vec<String> = data
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let numeric = data
                .rows()
                .iter()
                .all(|row| !matches!(row[i], Cell::Text(_)));
            let kind = if numeric { "REAL" } else { "TEXT" };
            format!("{} {kind}", quote_identifier(column))
        })
        .collect();
    let placeholders = vec!["?"; data.n_cols()].join(", ");

    let tx = conn.transaction()?;
    tx.execute(&format!("DROP TABLE IF EXISTS {name}"), [])?;
    tx.execute(
        &format!("CREATE TABLE {name} ({})", column_defs.join(", ")),
        [],
    )?;
    {
        let mut insert = tx.prepare(&format!("INSERT INTO {name} VALUES ({placeholders})"))?;
        for row in data.rows() {
            insert.execute(rusqlite::params_from_iter(row.iter().map(to_value)))?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn to_value(cell: &Cell) -> Value {
    match cell {
        Cell::Number(v) if !v.is_nan() => Value::Real(*v),
        Cell::Number(_) | Cell::Missing => Value::Null,
        Cell::Text(s) => Value::Text(s.clone()),
    }
}
