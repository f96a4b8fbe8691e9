use sqlx::Row as _;
use sqlx::postgres::PgPool;

use mergeflow::error::{LoadError, LoadResult};
use mergeflow::schema::SchemaIntrospector;
use mergeflow::types::{ColumnDescriptor, TableRef};

/// Column metadata with primary-key membership, in ordinal order.
const COLUMNS_QUERY: &str = r#"
    SELECT c.column_name,
           c.data_type,
           c.is_nullable,
           (pk.column_name IS NOT NULL) AS is_primary
    FROM information_schema.columns c
    LEFT JOIN (
        SELECT k.table_schema, k.table_name, k.column_name
        FROM information_schema.table_constraints t
        JOIN information_schema.key_column_usage k
            ON t.constraint_name = k.constraint_name
            AND t.table_schema = k.table_schema
            AND t.table_name = k.table_name
        WHERE t.constraint_type = 'PRIMARY KEY'
    ) pk
        ON c.table_schema = pk.table_schema
        AND c.table_name = pk.table_name
        AND c.column_name = pk.column_name
    WHERE c.table_schema = $1
      AND c.table_name = $2
    ORDER BY c.ordinal_position
"#;

/// Schema introspector reading `information_schema` over a sqlx pool.
///
/// Unqualified tables are resolved against the `public` schema.
#[derive(Debug, Clone)]
pub struct PgIntrospector {
    pool: PgPool,
}

impl PgIntrospector {
    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SchemaIntrospector for PgIntrospector {
    async fn columns(&self, table: &TableRef) -> LoadResult<Vec<ColumnDescriptor>> {
        let schema = table.schema.as_deref().unwrap_or("public");

        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(schema)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                LoadError::schema_resolution(format!(
                    "introspection of {} failed: {error}",
                    table.qualified()
                ))
            })?;

        if rows.is_empty() {
            return Err(LoadError::schema_resolution(format!(
                "table {} not found",
                table.qualified()
            )));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = try_column(&row, "column_name", table)?;
            let data_type: String = try_column(&row, "data_type", table)?;
            let is_nullable: String = try_column(&row, "is_nullable", table)?;
            let is_primary: bool = try_column(&row, "is_primary", table)?;

            columns.push(ColumnDescriptor::new(
                name,
                data_type.to_uppercase(),
                is_primary,
                is_nullable == "YES",
            ));
        }

        Ok(columns)
    }
}

fn try_column<'r, T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>>(
    row: &'r sqlx::postgres::PgRow,
    column: &str,
    table: &TableRef,
) -> LoadResult<T> {
    row.try_get(column).map_err(|error| {
        LoadError::schema_resolution(format!(
            "introspection of {} returned an unreadable '{column}' value: {error}",
            table.qualified()
        ))
    })
}
