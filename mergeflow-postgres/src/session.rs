use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, Transaction};

use mergeflow::dialect::Dialect;
use mergeflow::error::{LoadError, LoadResult};
use mergeflow::session::{SessionProvider, SqlSession};
use mergeflow::types::{Cell, Row};

/// Postgres engine backed by a sqlx connection pool.
///
/// Sessions acquired from the engine are transactions: nothing is visible
/// to other connections until the session owner commits.
#[derive(Debug, Clone)]
pub struct PgEngine {
    pool: PgPool,
}

impl PgEngine {
    /// Connects a new pool to the given database URL.
    pub async fn connect(url: &str) -> LoadResult<Self> {
        let pool = PgPoolOptions::new()
            .connect(url)
            .await
            .map_err(|error| LoadError::execution_with_source("connection failed", error))?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl SessionProvider for PgEngine {
    type Session = PgSession;

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn acquire(&self) -> LoadResult<PgSession> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|error| LoadError::execution_with_source("failed to begin transaction", error))?;

        Ok(PgSession { tx: Some(tx) })
    }
}

/// One transactional unit of work against Postgres.
#[derive(Debug)]
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn tx(&mut self) -> LoadResult<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| LoadError::execution("session already committed"))
    }
}

impl SqlSession for PgSession {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&mut self, sql: &str) -> LoadResult<u64> {
        let tx = self.tx()?;

        let result = sqlx::query(sql)
            .execute(&mut **tx)
            .await
            .map_err(|error| {
                LoadError::execution_with_source(format!("statement rejected: {sql}"), error)
            })?;

        Ok(result.rows_affected())
    }

    async fn execute_many(&mut self, sql: &str, rows: &[Row]) -> LoadResult<u64> {
        let tx = self.tx()?;

        let mut affected = 0;
        for row in rows {
            let mut query = sqlx::query(sql);
            for cell in row.values() {
                query = bind_cell(query, cell);
            }

            affected += query
                .execute(&mut **tx)
                .await
                .map_err(|error| {
                    LoadError::execution_with_source(format!("statement rejected: {sql}"), error)
                })?
                .rows_affected();
        }

        Ok(affected)
    }

    async fn commit(&mut self) -> LoadResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| LoadError::execution("session already committed"))?;

        tx.commit()
            .await
            .map_err(|error| LoadError::execution_with_source("commit failed", error))
    }
}

/// Binds one cell as the next positional parameter.
///
/// Null is bound as a missing text value; Postgres infers the parameter
/// type from the statement, so this only matters when the statement gives
/// it no context.
fn bind_cell<'q>(
    query: Query<'q, Postgres, PgArguments>,
    cell: &Cell,
) -> Query<'q, Postgres, PgArguments> {
    match cell {
        Cell::Null => query.bind(Option::<String>::None),
        Cell::Bool(value) => query.bind(*value),
        Cell::I16(value) => query.bind(*value),
        Cell::I32(value) => query.bind(*value),
        Cell::I64(value) => query.bind(*value),
        Cell::F32(value) => query.bind(*value),
        Cell::F64(value) => query.bind(*value),
        Cell::String(value) => query.bind(value.clone()),
        Cell::Bytes(value) => query.bind(value.clone()),
        Cell::Date(value) => query.bind(*value),
        Cell::Time(value) => query.bind(*value),
        Cell::Timestamp(value) => query.bind(*value),
        Cell::TimestampTz(value) => query.bind(*value),
        Cell::Uuid(value) => query.bind(*value),
        Cell::Json(value) => query.bind(value.clone()),
    }
}
