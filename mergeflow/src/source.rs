//! Source-side extraction: query resolution and the reader seam.

use std::future::Future;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::types::{Dataset, TableRef};

/// What to extract from an upstream source: exactly one of a table or a
/// query.
#[derive(Debug, Clone, Default)]
pub struct SourceSpec {
    /// Read the whole table.
    pub table: Option<TableRef>,
    /// Run a query: literal SQL text, or a path to a `.sql` file.
    pub query: Option<String>,
}

impl SourceSpec {
    /// Extraction of a whole table.
    pub fn from_table(table: TableRef) -> Self {
        Self {
            table: Some(table),
            query: None,
        }
    }

    /// Extraction of a query result.
    pub fn from_query(query: impl Into<String>) -> Self {
        Self {
            table: None,
            query: Some(query.into()),
        }
    }
}

/// Row-range chunking for parallel source reads.
#[derive(Debug, Clone, Copy)]
pub struct ReadChunking {
    /// Maximum rows per concurrent range read.
    pub chunk_size: usize,
}

/// Trait for materializing a query's full result set as a [`Dataset`].
pub trait SourceReader: Send + Sync {
    /// Runs the query and returns all rows, optionally reading in
    /// parallel row-range chunks.
    fn fetch(
        &self,
        query: &str,
        chunking: Option<ReadChunking>,
    ) -> impl Future<Output = LoadResult<Dataset>> + Send;
}

/// Resolves a [`SourceSpec`] into the SQL text to run against the source.
///
/// A table spec becomes `SELECT * FROM <qualified>`. A query spec is
/// returned verbatim unless it names an existing `.sql` file, in which
/// case the file's contents are read.
pub fn resolve_query(spec: &SourceSpec) -> LoadResult<String> {
    match (&spec.table, &spec.query) {
        (Some(_), Some(_)) => Err(LoadError::invalid_argument(
            "supply either a source table or a source query, not both",
        )),
        (None, None) => Err(LoadError::invalid_argument(
            "either a source table or a source query must be supplied",
        )),
        (Some(table), None) => Ok(format!("SELECT * FROM {}", table.qualified())),
        (None, Some(query)) => {
            let path = Path::new(query);
            if query.ends_with(".sql") && path.is_file() {
                Ok(std::fs::read_to_string(path)?)
            } else {
                Ok(query.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_spec_becomes_a_select_star() {
        let spec = SourceSpec::from_table(TableRef::with_schema("orders", "sales"));

        assert_eq!(resolve_query(&spec).unwrap(), "SELECT * FROM sales.orders");
    }

    #[test]
    fn literal_query_passes_through() {
        let spec = SourceSpec::from_query("SELECT id FROM orders WHERE status = 'open'");

        assert_eq!(
            resolve_query(&spec).unwrap(),
            "SELECT id FROM orders WHERE status = 'open'"
        );
    }

    #[test]
    fn sql_file_paths_are_read() {
        let path = std::env::temp_dir().join(format!("mergeflow_extract_{}.sql", std::process::id()));
        std::fs::write(&path, "SELECT id FROM orders").unwrap();

        let spec = SourceSpec::from_query(path.to_string_lossy());
        let resolved = resolve_query(&spec).unwrap();

        std::fs::remove_file(&path).unwrap();
        assert_eq!(resolved, "SELECT id FROM orders");
    }

    #[test]
    fn both_or_neither_is_invalid() {
        let both = SourceSpec {
            table: Some(TableRef::new("orders")),
            query: Some("SELECT 1".to_string()),
        };

        assert!(matches!(
            resolve_query(&both),
            Err(LoadError::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve_query(&SourceSpec::default()),
            Err(LoadError::InvalidArgument(_))
        ));
    }
}
