use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::dialect::Dialect;
use crate::error::{LoadError, LoadResult};
use crate::session::{SessionProvider, SqlSession};
use crate::types::Row;

/// One entry in the engine's execution log.
#[derive(Debug, Clone)]
pub struct Recorded {
    /// What was executed.
    pub kind: RecordedKind,
    /// The statement text; empty for commits.
    pub sql: String,
}

/// The kind of a recorded entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedKind {
    /// A plain statement execution.
    Execute,
    /// A parameterized execution with the number of bound rows.
    ExecuteMany { rows: usize },
    /// A session commit.
    Commit,
}

#[derive(Debug, Default)]
struct FailRule {
    sql_contains: Option<String>,
    rows: Option<usize>,
}

impl FailRule {
    fn matches(&self, sql: &str, rows: Option<usize>) -> bool {
        let sql_hit = self
            .sql_contains
            .as_ref()
            .is_none_or(|needle| sql.contains(needle.as_str()));
        let rows_hit = match self.rows {
            Some(expected) => rows == Some(expected),
            None => true,
        };

        sql_hit && rows_hit
    }
}

#[derive(Debug, Default)]
struct Inner {
    log: Vec<Recorded>,
    fail_rules: Vec<FailRule>,
}

/// In-memory engine for testing and development purposes.
///
/// [`MemoryEngine`] hands out sessions that record every statement,
/// bound-row count and commit into one shared, ordered log. Statements
/// that match a configured failure rule are rejected with an execution
/// error and left out of the log, which lets tests assert both failure
/// propagation and what never reached the engine.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    dialect: Dialect,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryEngine {
    /// Creates an engine reporting the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Rejects any statement whose text contains `needle`.
    pub async fn fail_on_sql(&self, needle: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.fail_rules.push(FailRule {
            sql_contains: Some(needle.into()),
            rows: None,
        });
    }

    /// Rejects any parameterized execution binding exactly `rows` rows.
    pub async fn fail_on_rows(&self, rows: usize) {
        let mut inner = self.inner.lock().await;
        inner.fail_rules.push(FailRule {
            sql_contains: None,
            rows: Some(rows),
        });
    }

    /// Returns a copy of the full execution log in order.
    pub async fn statements(&self) -> Vec<Recorded> {
        let inner = self.inner.lock().await;
        inner.log.clone()
    }

    /// Returns the statement texts of all executions, commits excluded.
    pub async fn sql_log(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .log
            .iter()
            .filter(|entry| entry.kind != RecordedKind::Commit)
            .map(|entry| entry.sql.clone())
            .collect()
    }

    /// Returns how many commits were recorded.
    pub async fn commit_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner
            .log
            .iter()
            .filter(|entry| entry.kind == RecordedKind::Commit)
            .count()
    }

    async fn record(&self, kind: RecordedKind, sql: &str, rows: Option<usize>) -> LoadResult<()> {
        let mut inner = self.inner.lock().await;

        if inner
            .fail_rules
            .iter()
            .any(|rule| rule.matches(sql, rows))
        {
            return Err(LoadError::execution(format!(
                "statement rejected by failure rule: {sql}"
            )));
        }

        inner.log.push(Recorded {
            kind,
            sql: sql.to_string(),
        });

        Ok(())
    }
}

impl SessionProvider for MemoryEngine {
    type Session = MemorySession;

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn acquire(&self) -> LoadResult<MemorySession> {
        Ok(MemorySession {
            engine: self.clone(),
        })
    }
}

/// A session handed out by [`MemoryEngine`].
#[derive(Debug)]
pub struct MemorySession {
    engine: MemoryEngine,
}

impl SqlSession for MemorySession {
    fn dialect(&self) -> Dialect {
        self.engine.dialect
    }

    async fn execute(&mut self, sql: &str) -> LoadResult<u64> {
        info!(sql, "memory engine execute");
        self.engine.record(RecordedKind::Execute, sql, None).await?;

        Ok(0)
    }

    async fn execute_many(&mut self, sql: &str, rows: &[Row]) -> LoadResult<u64> {
        info!(sql, rows = rows.len(), "memory engine execute_many");
        self.engine
            .record(RecordedKind::ExecuteMany { rows: rows.len() }, sql, Some(rows.len()))
            .await?;

        Ok(rows.len() as u64)
    }

    async fn commit(&mut self) -> LoadResult<()> {
        self.engine.record(RecordedKind::Commit, "", None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    #[tokio::test]
    async fn records_statements_in_order() {
        let engine = MemoryEngine::new(Dialect::Postgres);
        let mut session = engine.acquire().await.unwrap();

        session.execute("DELETE FROM orders").await.unwrap();
        session
            .execute_many("INSERT", &[Row::new(vec![Cell::I64(1)])])
            .await
            .unwrap();
        session.commit().await.unwrap();

        let log = engine.statements().await;
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].sql, "DELETE FROM orders");
        assert_eq!(log[1].kind, RecordedKind::ExecuteMany { rows: 1 });
        assert_eq!(log[2].kind, RecordedKind::Commit);
    }

    #[tokio::test]
    async fn failure_rules_reject_and_skip_logging() {
        let engine = MemoryEngine::new(Dialect::Postgres);
        engine.fail_on_sql("CREATE TEMP TABLE").await;
        let mut session = engine.acquire().await.unwrap();

        let result = session.execute("CREATE TEMP TABLE t (id INTEGER)").await;

        assert!(matches!(result, Err(LoadError::Execution { .. })));
        assert!(engine.statements().await.is_empty());
    }
}
