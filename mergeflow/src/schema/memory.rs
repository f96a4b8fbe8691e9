use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{LoadError, LoadResult};
use crate::schema::SchemaIntrospector;
use crate::types::{ColumnDescriptor, TableRef};

/// In-memory introspector for testing and development purposes.
///
/// [`MemoryIntrospector`] serves column metadata from a fixed map instead
/// of a live catalog, so pipelines can be exercised without a database.
#[derive(Debug, Clone, Default)]
pub struct MemoryIntrospector {
    tables: Arc<Mutex<HashMap<String, Vec<ColumnDescriptor>>>>,
}

impl MemoryIntrospector {
    /// Creates an empty introspector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table and its ordered column metadata.
    pub fn add_table(&self, table: &TableRef, columns: Vec<ColumnDescriptor>) {
        let mut tables = self.tables.lock().unwrap();
        tables.insert(table.qualified(), columns);
    }
}

impl SchemaIntrospector for MemoryIntrospector {
    async fn columns(&self, table: &TableRef) -> LoadResult<Vec<ColumnDescriptor>> {
        let tables = self.tables.lock().unwrap();

        tables.get(&table.qualified()).cloned().ok_or_else(|| {
            LoadError::schema_resolution(format!("table {} not found", table.qualified()))
        })
    }
}
