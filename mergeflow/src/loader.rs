//! The loader facade driving insert, truncate, and merge pipelines.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::dialect::Dialect;
use crate::error::{LoadError, LoadResult};
use crate::insert::{self, InsertOptions, LoadReport};
use crate::merge::{MergeOptions, MergeReport, WriteMode};
use crate::partition::{Partitioner, RowCountPartitioner};
use crate::schema::SchemaIntrospector;
use crate::session::{SessionProvider, SharedSession, SqlSession};
use crate::source::{ReadChunking, SourceReader, SourceSpec};
use crate::sqlgen::{MergeStatement, SqlGenerator, StandardSqlGenerator};
use crate::staging::{self, StagingTablePlan};
use crate::types::{Cell, Dataset, Row, TableRef};

/// How many fresh staging names are tried when the engine rejects the
/// staging DDL.
const STAGING_CREATE_ATTEMPTS: usize = 3;

/// Loads an in-memory dataset into relational targets, as a plain insert
/// or as a staged merge.
///
/// [`Loader`] owns its collaborators: a [`SessionProvider`] for the
/// target engine, a [`SchemaIntrospector`] for live metadata, a
/// [`SqlGenerator`] for statement text, and a [`Partitioner`] for the
/// fan-out load phase. A dataset is loaded once with
/// [`Loader::load_dataset`] (or [`Loader::extract`]) and then written
/// with [`Loader::insert`] or [`Loader::merge`].
#[derive(Debug)]
pub struct Loader<P, I, G = StandardSqlGenerator, T = RowCountPartitioner> {
    provider: P,
    introspector: I,
    generator: G,
    partitioner: T,
    dataset: Option<Dataset>,
}

impl<P, I> Loader<P, I>
where
    P: SessionProvider + Clone + Send + Sync + 'static,
    I: SchemaIntrospector,
{
    /// Creates a loader with the reference generator and partitioner.
    pub fn new(provider: P, introspector: I) -> Self {
        Self {
            provider,
            introspector,
            generator: StandardSqlGenerator,
            partitioner: RowCountPartitioner,
            dataset: None,
        }
    }
}

impl<P, I, G, T> Loader<P, I, G, T>
where
    P: SessionProvider + Clone + Send + Sync + 'static,
    I: SchemaIntrospector,
    G: SqlGenerator,
    T: Partitioner,
{
    /// Replaces the SQL-text generator.
    pub fn with_generator<G2: SqlGenerator>(self, generator: G2) -> Loader<P, I, G2, T> {
        Loader {
            provider: self.provider,
            introspector: self.introspector,
            generator,
            partitioner: self.partitioner,
            dataset: self.dataset,
        }
    }

    /// Replaces the partitioner.
    pub fn with_partitioner<T2: Partitioner>(self, partitioner: T2) -> Loader<P, I, G, T2> {
        Loader {
            provider: self.provider,
            introspector: self.introspector,
            generator: self.generator,
            partitioner,
            dataset: self.dataset,
        }
    }

    /// Loads the dataset subsequent operations will write.
    pub fn load_dataset(&mut self, dataset: Dataset) -> &mut Self {
        self.dataset = Some(dataset);
        self
    }

    /// Returns the currently loaded dataset, if any.
    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// Extracts a dataset from an upstream source and loads it.
    pub async fn extract<R: SourceReader>(
        &mut self,
        reader: &R,
        spec: &SourceSpec,
        chunking: Option<ReadChunking>,
    ) -> LoadResult<&mut Self> {
        let query = crate::source::resolve_query(spec)?;
        let dataset = reader.fetch(&query, chunking).await?;

        info!(rows = dataset.len(), "extracted source dataset");
        self.dataset = Some(dataset);

        Ok(self)
    }

    /// Deletes all rows of the target table in one committed session.
    ///
    /// A row-delete is used instead of DDL truncation so the table's
    /// structure and grants survive across engines.
    pub async fn truncate(&self, target: &TableRef) -> LoadResult<()> {
        let mut session = self.provider.acquire().await?;
        let sql = format!("DELETE FROM {}", target.qualified());

        info!(table = %target, "truncating target table");
        session.execute(&sql).await?;
        session.commit().await
    }

    /// Writes the loaded dataset into the target table.
    ///
    /// The dataset is partitioned and fanned out over fresh sessions,
    /// one per partition; with `full_refresh` the target is truncated
    /// (and the truncation committed) before any partition is submitted.
    /// Partition failures are collected and surfaced in aggregate once
    /// every partition has completed.
    pub async fn insert(&self, target: &TableRef, options: &InsertOptions) -> LoadResult<LoadReport> {
        options.load.validate()?;
        let dataset = self.loaded_dataset()?;

        let partitions = self.partitioner.partition(
            dataset,
            options.load.chunk_size,
            options.load.partition_by.as_deref(),
        )?;
        let total = partitions.len();

        if options.full_refresh {
            self.truncate(target).await?;
        }

        let sql = Arc::new(self.generator.insert_statement(
            self.provider.dialect(),
            target,
            dataset.columns(),
            None,
        ));

        info!(table = %target, partitions = total, "starting partition insert");
        let (rows_written, failures) = insert::load_partitions_pooled(
            &self.provider,
            sql,
            partitions,
            options.load.max_concurrency,
        )
        .await;

        if !failures.is_empty() {
            return Err(LoadError::PartitionFailures { total, failures });
        }

        Ok(LoadReport {
            partitions: total,
            rows_written,
        })
    }

    /// Writes the loaded dataset into the target table through a
    /// caller-supplied session.
    ///
    /// All partitions multiplex onto the shared session, which serializes
    /// their statements; commit stays with the session's owner. With
    /// `full_refresh` the truncation still runs in its own committed
    /// session before any partition is submitted.
    pub async fn insert_with_session(
        &self,
        shared: &SharedSession<P::Session>,
        target: &TableRef,
        options: &InsertOptions,
    ) -> LoadResult<LoadReport> {
        options.load.validate()?;
        let dataset = self.loaded_dataset()?;

        let partitions = self.partitioner.partition(
            dataset,
            options.load.chunk_size,
            options.load.partition_by.as_deref(),
        )?;
        let total = partitions.len();

        if options.full_refresh {
            self.truncate(target).await?;
        }

        let sql = Arc::new(self.generator.insert_statement(
            self.provider.dialect(),
            target,
            dataset.columns(),
            None,
        ));

        info!(table = %target, partitions = total, "starting partition insert on shared session");
        let (rows_written, failures) = insert::load_partitions_shared(
            shared.clone(),
            sql,
            partitions,
            options.load.max_concurrency,
        )
        .await;

        if !failures.is_empty() {
            return Err(LoadError::PartitionFailures { total, failures });
        }

        Ok(LoadReport {
            partitions: total,
            rows_written,
        })
    }

    /// Merges the loaded dataset into the target table through a
    /// session-scoped staging table.
    ///
    /// One session carries the whole pipeline: staging DDL, the staging
    /// load, and the final merge statement all execute in it, and it is
    /// committed once after the merge. A staging table that was created
    /// but never merged is reported through the returned error, never
    /// cleaned up silently.
    pub async fn merge(&self, target: &TableRef, options: &MergeOptions) -> LoadResult<MergeReport> {
        options.load.validate()?;
        let dataset = self.loaded_dataset()?;
        let dialect = self.provider.dialect();

        // One session for the whole pipeline; partition writers share it
        // behind a mutex.
        let session = self.provider.acquire().await?;
        let shared = SharedSession::new(session);

        let match_columns = self.resolve_match_columns(target, options).await?;
        let constraint_columns = self.resolve_constraint_columns(target, options).await?;

        let partitions = self.partitioner.partition(
            dataset,
            options.load.chunk_size,
            options.load.partition_by.as_deref(),
        )?;
        let total = partitions.len();

        let staging_name = self.create_staging_table(target, dialect, &shared).await?;
        let staging_ref = if dialect.uses_global_temp_prefix() {
            TableRef::new(format!("##{staging_name}"))
        } else {
            TableRef::new(staging_name)
        };

        info!(
            table = %target,
            staging = %staging_ref,
            partitions = total,
            mode = ?options.write_mode,
            "loading staging table"
        );
        let rows_staged = match options.write_mode {
            WriteMode::Parameterized => {
                let staging_options = InsertOptions {
                    load: options.load.clone(),
                    full_refresh: false,
                };
                self.insert_with_session(&shared, &staging_ref, &staging_options)
                    .await?;

                dataset.len() as u64
            }
            WriteMode::Bulk => {
                for partition in &partitions {
                    let sql = self.generator.bulk_insert_statement(
                        dialect,
                        &staging_ref,
                        dataset.columns(),
                        partition.len(),
                    );
                    let flattened: Vec<Cell> = partition
                        .rows
                        .iter()
                        .flat_map(|row| row.values().iter().cloned())
                        .collect();
                    shared.execute_many(&sql, &[Row::new(flattened)]).await?;
                }

                dataset.len() as u64
            }
        };

        let merge_sql = self.generator.merge_statement(&MergeStatement {
            dialect,
            target,
            staging: &staging_ref,
            columns: dataset.columns(),
            match_columns: &match_columns,
            constraint_columns: &constraint_columns,
        })?;

        info!(table = %target, staging = %staging_ref, "executing merge statement");
        shared.execute(&merge_sql).await?;
        shared.commit().await?;

        Ok(MergeReport {
            staging_table: staging_ref,
            partitions: total,
            rows_staged,
        })
    }

    /// Creates the staging table in the pipeline session, retrying with
    /// a fresh name when the engine rejects the DDL (treated as a name
    /// collision). Returns the bare generated name.
    async fn create_staging_table(
        &self,
        target: &TableRef,
        dialect: Dialect,
        shared: &SharedSession<P::Session>,
    ) -> LoadResult<String> {
        let base_plan =
            staging::plan_staging_table(&self.introspector, target, None, None, dialect).await?;

        let mut last_error = None;
        for attempt in 1..=STAGING_CREATE_ATTEMPTS {
            let candidate = staging::generate_staging_name(&target.name);
            let plan = StagingTablePlan {
                table: TableRef::new(candidate.clone()),
                columns: base_plan.columns.clone(),
                dialect,
            };
            let ddl = staging::render_staging_ddl(&plan)?;

            match shared.execute(&ddl).await {
                Ok(_) => return Ok(candidate),
                Err(error) => {
                    warn!(attempt, staging = %candidate, error = %error, "staging table creation rejected");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| LoadError::execution("staging table creation failed")))
    }

    async fn resolve_match_columns(
        &self,
        target: &TableRef,
        options: &MergeOptions,
    ) -> LoadResult<BTreeSet<String>> {
        match &options.match_columns {
            Some(columns) => {
                if columns.is_empty() {
                    return Err(LoadError::invalid_argument(
                        "match_columns must not be empty",
                    ));
                }
                Ok(columns.clone())
            }
            None => {
                let primary_key = self.introspector.primary_key(target).await?;
                if primary_key.is_empty() {
                    return Err(LoadError::schema_resolution(format!(
                        "table {} has no primary key and no match columns were supplied",
                        target.qualified()
                    )));
                }
                Ok(primary_key)
            }
        }
    }

    async fn resolve_constraint_columns(
        &self,
        target: &TableRef,
        options: &MergeOptions,
    ) -> LoadResult<BTreeSet<String>> {
        match &options.constraint_columns {
            Some(columns) => {
                if columns.is_empty() {
                    return Err(LoadError::invalid_argument(
                        "constraint_columns must not be empty",
                    ));
                }
                Ok(columns.clone())
            }
            None => {
                let update_columns = self.introspector.update_columns(target).await?;
                if update_columns.is_empty() {
                    return Err(LoadError::invalid_argument(format!(
                        "table {} has no non-key columns; supply constraint_columns",
                        target.qualified()
                    )));
                }
                Ok(update_columns)
            }
        }
    }

    fn loaded_dataset(&self) -> LoadResult<&Dataset> {
        self.dataset
            .as_ref()
            .ok_or_else(|| LoadError::invalid_argument("no dataset loaded"))
    }
}
