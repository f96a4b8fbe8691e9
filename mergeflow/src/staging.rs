//! Staging-table provisioning: naming, planning, DDL rendering.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;

use crate::dialect::Dialect;
use crate::error::{LoadError, LoadResult};
use crate::schema::SchemaIntrospector;
use crate::types::{ColumnDescriptor, TableRef};

/// Whole-token identity clause, with or without a `(seed, increment)`
/// pair. Tokens that merely start with `IDENTITY` (e.g. a column named
/// `IDENTITY_COL`) do not match.
static IDENTITY_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bIDENTITY\b(\s*\(\d+\s*,\s*\d+\))?").unwrap());

/// Per-process staging-name counter, mixed into the random suffix so two
/// draws in the same instant still diverge.
static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A provisioned staging table: the generated reference, its column
/// layout, and the dialect its DDL must target.
#[derive(Debug, Clone)]
pub struct StagingTablePlan {
    /// The staging table reference (generated name, optional schema).
    pub table: TableRef,
    /// Columns copied from the source table, in source order.
    pub columns: Vec<ColumnDescriptor>,
    /// Dialect the DDL is rendered for.
    pub dialect: Dialect,
}

/// Generates a staging-table name of the form
/// `_source_{base}_{4 lowercase chars}`.
///
/// The suffix mixes a random draw with a process-wide counter; callers
/// treat a rejected staging DDL as a retryable collision and ask for a
/// fresh name.
pub fn generate_staging_name(base: &str) -> String {
    let counter = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    let noise: u64 = rand::random();
    let mut value = noise ^ counter.wrapping_mul(0x9E37_79B9_7F4A_7C15);

    let mut suffix = String::with_capacity(4);
    for _ in 0..4 {
        suffix.push((b'a' + (value % 26) as u8) as char);
        value /= 26;
    }

    format!("_source_{base}_{suffix}")
}

/// Builds a staging plan by introspecting the source table.
///
/// The staging table takes `new_name` when given (the generated staging
/// name), otherwise the source's own name, under `target_schema` when
/// one is supplied.
pub async fn plan_staging_table<I: SchemaIntrospector>(
    introspector: &I,
    source: &TableRef,
    new_name: Option<&str>,
    target_schema: Option<&str>,
    dialect: Dialect,
) -> LoadResult<StagingTablePlan> {
    let columns = introspector.columns(source).await?;
    if columns.is_empty() {
        return Err(LoadError::schema_resolution(format!(
            "table {} has no columns",
            source.qualified()
        )));
    }

    let name = new_name.unwrap_or(&source.name);
    let table = match target_schema {
        Some(schema) => TableRef::with_schema(name, schema),
        None => TableRef::new(name),
    };

    Ok(StagingTablePlan {
        table,
        columns,
        dialect,
    })
}

/// Renders the dialect-specific temporary-table DDL for a plan.
///
/// A standard quoted `CREATE TABLE` is rendered first, then rewritten:
/// identifier quoting is stripped, the header is substituted with the
/// dialect's temporary-table header, bracket quoting is stripped, and
/// whole-token identity clauses are removed. Dialects without a
/// temporary-table header fail before anything is rendered.
pub fn render_staging_ddl(plan: &StagingTablePlan) -> LoadResult<String> {
    let header = plan.dialect.temp_table_header().ok_or_else(|| {
        LoadError::schema_resolution(format!(
            "dialect {} has no temporary table support",
            plan.dialect
        ))
    })?;

    let ddl = render_create_table(&plan.table, &plan.columns);

    let ddl = ddl.replace('"', "");
    let ddl = ddl.replace("CREATE TABLE ", header);
    let ddl = ddl.replace(['[', ']'], "");
    let ddl = IDENTITY_CLAUSE.replace_all(&ddl, "").into_owned();

    Ok(ddl)
}

/// Renders a standard `CREATE TABLE` with quoted identifiers, one column
/// per line, and a trailing primary-key clause when the plan has key
/// columns.
fn render_create_table(table: &TableRef, columns: &[ColumnDescriptor]) -> String {
    let qualified = match &table.schema {
        Some(schema) => format!("\"{schema}\".\"{}\"", table.name),
        None => format!("\"{}\"", table.name),
    };

    let mut lines = Vec::with_capacity(columns.len() + 1);
    for column in columns {
        let mut line = format!("\t\"{}\" {}", column.name, column.native_type);
        if !column.nullable {
            line.push_str(" NOT NULL");
        }
        lines.push(line);
    }

    let key_columns: Vec<String> = columns
        .iter()
        .filter(|column| column.primary_key)
        .map(|column| format!("\"{}\"", column.name))
        .collect();
    if !key_columns.is_empty() {
        lines.push(format!("\tPRIMARY KEY ({})", key_columns.join(", ")));
    }

    format!("CREATE TABLE {qualified} (\n{}\n)", lines.join(", \n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::memory::MemoryIntrospector;

    fn orders_plan(dialect: Dialect) -> StagingTablePlan {
        StagingTablePlan {
            table: TableRef::new("_source_orders_abcd"),
            columns: vec![
                ColumnDescriptor::new("id", "INTEGER", true, false),
                ColumnDescriptor::new("status", "VARCHAR(20)", false, true),
            ],
            dialect,
        }
    }

    #[test]
    fn renders_postgres_temp_ddl() {
        let ddl = render_staging_ddl(&orders_plan(Dialect::Postgres)).unwrap();

        assert_eq!(
            ddl,
            "CREATE TEMP TABLE _source_orders_abcd (\n\
             \tid INTEGER NOT NULL, \n\
             \tstatus VARCHAR(20), \n\
             \tPRIMARY KEY (id)\n)"
        );
    }

    #[test]
    fn rendering_is_idempotent_for_a_fixed_plan() {
        let plan = orders_plan(Dialect::Postgres);

        assert_eq!(
            render_staging_ddl(&plan).unwrap(),
            render_staging_ddl(&plan).unwrap()
        );
    }

    #[test]
    fn mssql_header_produces_a_global_temp_name() {
        let ddl = render_staging_ddl(&orders_plan(Dialect::Mssql)).unwrap();

        assert!(ddl.starts_with("CREATE TABLE ##_source_orders_abcd ("));
    }

    #[test]
    fn identity_clauses_are_stripped_whole_token() {
        let plan = StagingTablePlan {
            table: TableRef::new("_source_orders_abcd"),
            columns: vec![
                ColumnDescriptor::new("id", "int IDENTITY(1,1)", true, false),
                ColumnDescriptor::new("seq", "int IDENTITY", false, false),
                ColumnDescriptor::new("IDENTITY_COL", "int", false, true),
            ],
            dialect: Dialect::Mssql,
        };

        let ddl = render_staging_ddl(&plan).unwrap();

        assert!(!ddl.contains("IDENTITY(1,1)"));
        assert!(!ddl.contains("IDENTITY "), "bare clause survived: {ddl}");
        assert!(ddl.contains("IDENTITY_COL int"));
    }

    #[test]
    fn bracket_quoting_is_stripped() {
        let plan = StagingTablePlan {
            table: TableRef::new("_source_orders_abcd"),
            columns: vec![ColumnDescriptor::new("id", "[int]", true, false)],
            dialect: Dialect::Mssql,
        };

        let ddl = render_staging_ddl(&plan).unwrap();

        assert!(!ddl.contains('['));
        assert!(!ddl.contains(']'));
        assert!(ddl.contains("id int"));
    }

    #[test]
    fn unsupported_dialect_never_yields_ddl() {
        let result = render_staging_ddl(&orders_plan(Dialect::Snowflake));

        assert!(matches!(result, Err(LoadError::SchemaResolution(_))));
    }

    #[test]
    fn staging_names_follow_the_expected_shape() {
        let name = generate_staging_name("orders");

        let shape = Regex::new(r"^_source_orders_[a-z]{4}$").unwrap();
        assert!(shape.is_match(&name), "unexpected name: {name}");
    }

    #[tokio::test]
    async fn planning_applies_rename_and_target_schema() {
        let introspector = MemoryIntrospector::new();
        introspector.add_table(
            &TableRef::new("orders"),
            vec![ColumnDescriptor::new("id", "INTEGER", true, false)],
        );

        let plan = plan_staging_table(
            &introspector,
            &TableRef::new("orders"),
            Some("_source_orders_abcd"),
            Some("scratch"),
            Dialect::Postgres,
        )
        .await
        .unwrap();

        assert_eq!(
            plan.table,
            TableRef::with_schema("_source_orders_abcd", "scratch")
        );
        assert_eq!(plan.columns.len(), 1);
    }

    #[tokio::test]
    async fn planning_requires_a_known_table_with_columns() {
        let introspector = MemoryIntrospector::new();
        introspector.add_table(&TableRef::new("empty"), Vec::new());

        let missing = plan_staging_table(
            &introspector,
            &TableRef::new("orders"),
            None,
            None,
            Dialect::Postgres,
        )
        .await;
        let empty = plan_staging_table(
            &introspector,
            &TableRef::new("empty"),
            None,
            None,
            Dialect::Postgres,
        )
        .await;

        assert!(matches!(missing, Err(LoadError::SchemaResolution(_))));
        assert!(matches!(empty, Err(LoadError::SchemaResolution(_))));
    }
}
