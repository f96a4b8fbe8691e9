use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Column as _, Row as _, TypeInfo as _};
use tokio::task::JoinSet;
use tracing::{info, warn};

use mergeflow::error::{LoadError, LoadResult};
use mergeflow::source::{ReadChunking, SourceReader};
use mergeflow::types::{Cell, Dataset, Row};

/// Source reader materializing Postgres query results as datasets.
///
/// Without chunking, the full result set is fetched in one pass. With
/// chunking, the result is read as parallel `LIMIT`/`OFFSET` row ranges
/// over the wrapped query and reassembled in range order; rows within the
/// overall result keep the order the wrapped query produces only when
/// that query orders its output.
#[derive(Debug, Clone)]
pub struct PgSourceReader {
    pool: PgPool,
}

impl PgSourceReader {
    /// Connects a new pool to the given database URL.
    pub async fn connect(url: &str) -> LoadResult<Self> {
        let pool = PgPool::connect(url)
            .await
            .map_err(|error| LoadError::execution_with_source("connection failed", error))?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_all(&self, query: &str) -> LoadResult<Dataset> {
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                LoadError::execution_with_source(format!("source query failed: {query}"), error)
            })?;

        dataset_from_rows(&rows)
    }

    async fn fetch_chunked(&self, query: &str, chunk_size: usize) -> LoadResult<Dataset> {
        let count_sql = count_query(query);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                LoadError::execution_with_source("source row count failed", error)
            })?;

        let ranges = chunk_ranges(total, chunk_size);
        info!(total, chunks = ranges.len(), "reading source in row ranges");

        let mut join_set: JoinSet<(usize, Result<Vec<PgRow>, sqlx::Error>)> = JoinSet::new();
        for (index, (offset, limit)) in ranges.into_iter().enumerate() {
            let pool = self.pool.clone();
            let range_sql = range_query(query, offset, limit);

            join_set.spawn(async move {
                let result = sqlx::query(&range_sql).fetch_all(&pool).await;
                (index, result)
            });
        }

        let mut chunks: Vec<(usize, Vec<PgRow>)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.map_err(|error| {
                LoadError::execution(format!("source range reader panicked: {error}"))
            })?;
            let rows = result.map_err(|error| {
                LoadError::execution_with_source("source range query failed", error)
            })?;
            chunks.push((index, rows));
        }
        chunks.sort_by_key(|(index, _)| *index);

        let all_rows: Vec<PgRow> = chunks.into_iter().flat_map(|(_, rows)| rows).collect();

        dataset_from_rows(&all_rows)
    }
}

impl SourceReader for PgSourceReader {
    async fn fetch(&self, query: &str, chunking: Option<ReadChunking>) -> LoadResult<Dataset> {
        match chunking {
            Some(chunking) if chunking.chunk_size > 0 => {
                self.fetch_chunked(query, chunking.chunk_size).await
            }
            _ => self.fetch_all(query).await,
        }
    }
}

/// Wraps a query so its cardinality can be counted.
fn count_query(query: &str) -> String {
    format!("SELECT COUNT(*) FROM ({query}) AS src")
}

/// Wraps a query into one `LIMIT`/`OFFSET` row range.
fn range_query(query: &str, offset: i64, limit: i64) -> String {
    format!("SELECT * FROM ({query}) AS src LIMIT {limit} OFFSET {offset}")
}

/// Splits `total` rows into `(offset, limit)` ranges of at most
/// `chunk_size` rows, covering the result exactly once.
fn chunk_ranges(total: i64, chunk_size: usize) -> Vec<(i64, i64)> {
    let chunk = chunk_size as i64;
    let mut ranges = Vec::new();
    let mut offset = 0;

    while offset < total {
        ranges.push((offset, chunk.min(total - offset)));
        offset += chunk;
    }

    ranges
}

/// Converts fetched rows into a [`Dataset`], taking the column layout
/// from the first row. An empty result yields an empty dataset with no
/// columns.
fn dataset_from_rows(rows: &[PgRow]) -> LoadResult<Dataset> {
    let Some(first) = rows.first() else {
        return Ok(Dataset::new(Vec::new()));
    };

    let columns: Vec<String> = first
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();

    let mut dataset = Dataset::new(columns);
    for row in rows {
        let mut cells = Vec::with_capacity(row.columns().len());
        for (index, column) in row.columns().iter().enumerate() {
            cells.push(decode_cell(row, index, column.type_info().name())?);
        }
        dataset.push_row(Row::new(cells))?;
    }

    Ok(dataset)
}

/// Decodes one column value into a [`Cell`], falling back to text and
/// finally to null for types outside the supported set.
fn decode_cell(row: &PgRow, index: usize, type_name: &str) -> LoadResult<Cell> {
    fn opt<T>(value: Option<T>, wrap: impl FnOnce(T) -> Cell) -> Cell {
        value.map(wrap).unwrap_or(Cell::Null)
    }

    let cell = match type_name {
        "BOOL" => opt(decode(row, index, type_name)?, Cell::Bool),
        "INT2" => opt(decode(row, index, type_name)?, Cell::I16),
        "INT4" => opt(decode(row, index, type_name)?, Cell::I32),
        "INT8" => opt(decode(row, index, type_name)?, Cell::I64),
        "FLOAT4" => opt(decode(row, index, type_name)?, Cell::F32),
        "FLOAT8" => opt(decode(row, index, type_name)?, Cell::F64),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => opt(decode(row, index, type_name)?, Cell::String),
        "BYTEA" => opt(decode(row, index, type_name)?, Cell::Bytes),
        "DATE" => opt(decode(row, index, type_name)?, Cell::Date),
        "TIME" => opt(decode(row, index, type_name)?, Cell::Time),
        "TIMESTAMP" => opt(decode(row, index, type_name)?, Cell::Timestamp),
        "TIMESTAMPTZ" => opt(decode(row, index, type_name)?, Cell::TimestampTz),
        "UUID" => opt(decode(row, index, type_name)?, Cell::Uuid),
        "JSON" | "JSONB" => opt(decode(row, index, type_name)?, Cell::Json),
        other => match row.try_get::<Option<String>, _>(index) {
            Ok(value) => opt(value, Cell::String),
            Err(_) => {
                warn!(column = index, r#type = other, "unsupported source type, reading as null");
                Cell::Null
            }
        },
    };

    Ok(cell)
}

fn decode<'r, T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>>(
    row: &'r PgRow,
    index: usize,
    type_name: &str,
) -> LoadResult<Option<T>> {
    row.try_get(index).map_err(|error| {
        LoadError::execution(format!(
            "failed to decode source column {index} ({type_name}): {error}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ranges_cover_the_count_exactly_once() {
        assert_eq!(
            chunk_ranges(12000, 5000),
            vec![(0, 5000), (5000, 5000), (10000, 2000)]
        );
        assert_eq!(chunk_ranges(0, 5000), Vec::<(i64, i64)>::new());
        assert_eq!(chunk_ranges(3, 5), vec![(0, 3)]);
    }

    #[test]
    fn wrapped_queries_preserve_the_inner_text() {
        assert_eq!(
            count_query("SELECT id FROM orders"),
            "SELECT COUNT(*) FROM (SELECT id FROM orders) AS src"
        );
        assert_eq!(
            range_query("SELECT id FROM orders", 5000, 2000),
            "SELECT * FROM (SELECT id FROM orders) AS src LIMIT 2000 OFFSET 5000"
        );
    }
}
