//! Options and reporting for the stage-load-merge pipeline.

use std::collections::BTreeSet;

use crate::config::LoadConfig;
use crate::types::TableRef;

/// How staged partitions are written into the staging table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Concurrent parameterized inserts, one bound row per dataset row.
    #[default]
    Parameterized,
    /// Sequential multi-row append statements, one per partition.
    Bulk,
}

/// Options for a merge into a target table.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Partitioning and concurrency settings for the staging load.
    pub load: LoadConfig,
    /// Columns joining staged rows to target rows. Defaults to the
    /// target's primary key.
    pub match_columns: Option<BTreeSet<String>>,
    /// Non-key columns overwritten on matched rows. Defaults to the
    /// target's non-key columns.
    pub constraint_columns: Option<BTreeSet<String>>,
    /// Staging write strategy.
    pub write_mode: WriteMode,
}

impl MergeOptions {
    /// Sets the match columns.
    pub fn with_match_columns<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.match_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the constraint columns.
    pub fn with_constraint_columns<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.constraint_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the staging write strategy.
    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// Sets the partition chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.load.chunk_size = chunk_size;
        self
    }
}

/// Outcome of a completed merge.
#[derive(Debug)]
pub struct MergeReport {
    /// The staging table the merge read from, as referenced in SQL
    /// (including any global temp prefix).
    pub staging_table: TableRef,
    /// Number of partitions staged.
    pub partitions: usize,
    /// Rows staged before the merge statement ran.
    pub rows_staged: u64,
}
