//! Session traits and the shared-session concurrency wrapper.

pub mod memory;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::dialect::Dialect;
use crate::error::LoadResult;
use crate::types::Row;

/// A scoped, exclusively-owned unit of work against one engine.
///
/// Commit is explicit: whichever component acquired the session is
/// responsible for invoking it. Dropping a session without committing
/// abandons its work.
pub trait SqlSession: Send {
    /// The dialect of the connected engine.
    fn dialect(&self) -> Dialect;

    /// Executes a single statement without bound parameters (DDL,
    /// DELETE, MERGE). Returns the number of affected rows where the
    /// engine reports one.
    fn execute(&mut self, sql: &str) -> impl Future<Output = LoadResult<u64>> + Send;

    /// Executes a parameterized statement once per row, binding each
    /// row's cells positionally. Returns the total number of affected
    /// rows.
    fn execute_many(&mut self, sql: &str, rows: &[Row])
    -> impl Future<Output = LoadResult<u64>> + Send;

    /// Commits the unit of work.
    fn commit(&mut self) -> impl Future<Output = LoadResult<()>> + Send;
}

/// Source of scoped sessions bound to one engine and dialect.
pub trait SessionProvider: Send + Sync {
    /// The session type this provider yields.
    type Session: SqlSession + Send + 'static;

    /// The dialect of the connected engine.
    fn dialect(&self) -> Dialect;

    /// Acquires a fresh scoped session.
    fn acquire(&self) -> impl Future<Output = LoadResult<Self::Session>> + Send;
}

/// A session shared by concurrent partition writers.
///
/// A single connection cannot run statements concurrently, so every
/// operation takes an async mutex: fan-out over a shared session is
/// serialized execution, not parallelism. True parallelism requires one
/// session per worker via [`SessionProvider::acquire`].
#[derive(Debug)]
pub struct SharedSession<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedSession<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: SqlSession> SharedSession<S> {
    /// Wraps a session for shared use.
    pub fn new(session: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Executes a single statement on the underlying session.
    pub async fn execute(&self, sql: &str) -> LoadResult<u64> {
        let mut session = self.inner.lock().await;
        session.execute(sql).await
    }

    /// Executes a parameterized statement once per row on the underlying
    /// session.
    pub async fn execute_many(&self, sql: &str, rows: &[Row]) -> LoadResult<u64> {
        let mut session = self.inner.lock().await;
        session.execute_many(sql, rows).await
    }

    /// Commits the underlying session.
    pub async fn commit(&self) -> LoadResult<()> {
        let mut session = self.inner.lock().await;
        session.commit().await
    }
}
