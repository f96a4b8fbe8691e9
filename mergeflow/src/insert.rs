//! Concurrent partition loading into a staging or target table.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::error;

use crate::config::LoadConfig;
use crate::error::{LoadError, LoadResult, PartitionFailure};
use crate::partition::Partition;
use crate::session::{SessionProvider, SharedSession, SqlSession};

/// Options for a plain partition insert into a target table.
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    /// Partitioning and concurrency settings.
    pub load: LoadConfig,
    /// Truncate the target before inserting any partition.
    pub full_refresh: bool,
}

/// Outcome of a successful fan-out load.
#[derive(Debug)]
pub struct LoadReport {
    /// Number of partitions written.
    pub partitions: usize,
    /// Rows reported written by the engine.
    pub rows_written: u64,
}

/// Outcome of one partition task: index, row count, result.
type TaskOutcome = (usize, usize, LoadResult<u64>);

/// Fans partitions out over fresh provider sessions, one per task.
///
/// Each task acquires its own scoped session, executes the insert and
/// commits it; a failed partition never aborts its siblings. Returns the
/// rows written plus all per-partition failures, ordered by partition
/// index.
pub(crate) async fn load_partitions_pooled<P>(
    provider: &P,
    sql: Arc<String>,
    partitions: Vec<Partition>,
    max_concurrency: usize,
) -> (u64, Vec<PartitionFailure>)
where
    P: SessionProvider + Clone + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
    let mut task_meta: HashMap<Id, (usize, usize)> = HashMap::new();

    for partition in partitions {
        let provider = provider.clone();
        let sql = sql.clone();
        let semaphore = semaphore.clone();
        let index = partition.index;
        let rows = partition.len();

        let handle = join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, rows, Err(LoadError::execution("worker pool closed"))),
            };

            let result = write_pooled(provider, &sql, &partition).await;
            (index, rows, result)
        });
        task_meta.insert(handle.id(), (index, rows));
    }

    drain(join_set, task_meta).await
}

/// Fans partitions out over one caller-supplied session.
///
/// All tasks multiplex onto the shared session, which serializes their
/// statements behind its mutex; commit stays with the session's owner.
pub(crate) async fn load_partitions_shared<S>(
    shared: SharedSession<S>,
    sql: Arc<String>,
    partitions: Vec<Partition>,
    max_concurrency: usize,
) -> (u64, Vec<PartitionFailure>)
where
    S: SqlSession + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
    let mut task_meta: HashMap<Id, (usize, usize)> = HashMap::new();

    for partition in partitions {
        let shared = shared.clone();
        let sql = sql.clone();
        let semaphore = semaphore.clone();
        let index = partition.index;
        let rows = partition.len();

        let handle = join_set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return (index, rows, Err(LoadError::execution("worker pool closed"))),
            };

            let result = shared.execute_many(&sql, &partition.rows).await;
            (index, rows, result)
        });
        task_meta.insert(handle.id(), (index, rows));
    }

    drain(join_set, task_meta).await
}

async fn write_pooled<P: SessionProvider>(
    provider: P,
    sql: &str,
    partition: &Partition,
) -> LoadResult<u64> {
    let mut session = provider.acquire().await?;
    let written = session.execute_many(sql, &partition.rows).await?;
    session.commit().await?;

    Ok(written)
}

/// Awaits every spawned partition task, collecting failures instead of
/// short-circuiting. A panicked task is reported as a failure of the
/// partition it carried.
async fn drain(
    mut join_set: JoinSet<TaskOutcome>,
    mut task_meta: HashMap<Id, (usize, usize)>,
) -> (u64, Vec<PartitionFailure>) {
    let mut rows_written = 0u64;
    let mut failures = Vec::new();

    while let Some(result) = join_set.join_next_with_id().await {
        match result {
            Ok((id, (index, rows, task_result))) => {
                task_meta.remove(&id);

                match task_result {
                    Ok(written) => rows_written += written,
                    Err(load_error) => {
                        error!(partition = index, error = %load_error, "partition load failed");
                        failures.push(PartitionFailure {
                            index,
                            rows,
                            error: Box::new(load_error),
                        });
                    }
                }
            }
            Err(join_error) => {
                if let Some((index, rows)) = task_meta.remove(&join_error.id()) {
                    error!(partition = index, error = %join_error, "partition worker panicked");
                    failures.push(PartitionFailure {
                        index,
                        rows,
                        error: Box::new(LoadError::execution(format!(
                            "partition worker panicked: {join_error}"
                        ))),
                    });
                }
            }
        }
    }

    failures.sort_by_key(|failure| failure.index);

    (rows_written, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::session::memory::MemoryEngine;
    use crate::types::{Cell, Row};

    fn partitions_of(sizes: &[usize]) -> Vec<Partition> {
        sizes
            .iter()
            .enumerate()
            .map(|(index, &size)| Partition {
                index,
                rows: (0..size).map(|i| Row::new(vec![Cell::I64(i as i64)])).collect(),
            })
            .collect()
    }

    #[tokio::test]
    async fn pooled_load_commits_each_partition() {
        let engine = MemoryEngine::new(Dialect::Postgres);
        let sql = Arc::new("INSERT INTO t (id) VALUES ($1)".to_string());

        let (written, failures) =
            load_partitions_pooled(&engine, sql, partitions_of(&[3, 2]), 4).await;

        assert_eq!(written, 5);
        assert!(failures.is_empty());
        assert_eq!(engine.commit_count().await, 2);
    }

    #[tokio::test]
    async fn failures_are_collected_without_aborting_siblings() {
        let engine = MemoryEngine::new(Dialect::Postgres);
        engine.fail_on_rows(2).await;
        let sql = Arc::new("INSERT INTO t (id) VALUES ($1)".to_string());

        let (written, failures) =
            load_partitions_pooled(&engine, sql, partitions_of(&[3, 2, 4]), 4).await;

        assert_eq!(written, 7);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].rows, 2);
    }
}
