//! In-process table store.

use super::TabularSource;
use crate::data::Table;
use crate::errors::PipelineError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Tables held in memory, keyed by name.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, builder style.
    #[must_use]
    pub fn with_table(self, name: impl Into<String>, table: Table) -> Self {
        self.insert(name, table);
        self
    }

    /// Adds or replaces a table.
    pub fn insert(&self, name: impl Into<String>, table: Table) {
        self.tables.write().insert(name.into(), table);
    }

    /// Returns a copy of a table.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Table> {
        self.tables.read().get(name).cloned()
    }

    /// Names of every stored table, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl TabularSource for InMemoryStore {
    async fn fetch_table(&self, table: &str) -> Result<Table, PipelineError> {
        self.get(table)
            .ok_or_else(|| PipelineError::Source(format!("no such table: {table}")))
    }

    async fn replace_table(&self, table: &str, data: &Table) -> Result<(), PipelineError> {
        self.insert(table, data.clone());
        Ok(())
    }
}
