//! Relational sources the pipeline reads from and writes results to.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::data::Table;
use crate::errors::PipelineError;
use async_trait::async_trait;

/// A store of named tables.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Returns every row and column of `table`.
    async fn fetch_table(&self, table: &str) -> Result<Table, PipelineError>;

    /// Replaces `table` with `data`, creating it if needed.
    async fn replace_table(&self, table: &str, data: &Table) -> Result<(), PipelineError>;
}

/// Quotes an SQL identifier.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
