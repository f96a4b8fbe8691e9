//! Schema introspection over live tables.

pub mod memory;

use std::collections::BTreeSet;
use std::future::Future;

use crate::error::LoadResult;
use crate::types::{ColumnDescriptor, TableRef};

/// Trait for reading column and constraint metadata from a live table.
///
/// Implementations query the connected engine's catalog. Column order must
/// match the table's column order, since it flows directly into staging
/// DDL and generated statements.
pub trait SchemaIntrospector: Send + Sync {
    /// Returns ordered column metadata for the table.
    ///
    /// An unknown table yields a `SchemaResolution` error, not an empty
    /// sequence.
    fn columns(
        &self,
        table: &TableRef,
    ) -> impl Future<Output = LoadResult<Vec<ColumnDescriptor>>> + Send;

    /// Returns the names of the table's primary-key columns.
    ///
    /// Empty when the table has no primary-key constraint.
    fn primary_key(
        &self,
        table: &TableRef,
    ) -> impl Future<Output = LoadResult<BTreeSet<String>>> + Send {
        async move {
            let columns = self.columns(table).await?;

            Ok(columns
                .into_iter()
                .filter(|column| column.primary_key)
                .map(|column| column.name)
                .collect())
        }
    }

    /// Returns the non-key columns eligible as default update targets
    /// during a merge.
    fn update_columns(
        &self,
        table: &TableRef,
    ) -> impl Future<Output = LoadResult<BTreeSet<String>>> + Send {
        async move {
            let columns = self.columns(table).await?;

            Ok(columns
                .into_iter()
                .filter(|column| !column.primary_key)
                .map(|column| column.name)
                .collect())
        }
    }
}
