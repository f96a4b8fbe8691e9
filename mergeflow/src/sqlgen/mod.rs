//! Generation of parameterized INSERT and dialect-specific merge SQL.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::dialect::Dialect;
use crate::error::{LoadError, LoadResult};
use crate::types::TableRef;

/// Everything needed to generate one set-based merge statement.
#[derive(Debug)]
pub struct MergeStatement<'a> {
    /// Dialect of the target engine.
    pub dialect: Dialect,
    /// The table receiving the merge.
    pub target: &'a TableRef,
    /// The staging table holding the new rows.
    pub staging: &'a TableRef,
    /// All columns shared by staging and target, in table order.
    pub columns: &'a [String],
    /// Columns joining staged rows to target rows.
    pub match_columns: &'a BTreeSet<String>,
    /// Non-key columns overwritten on matched rows.
    pub constraint_columns: &'a BTreeSet<String>,
}

/// Trait for producing the SQL text executed by the load and merge
/// phases.
pub trait SqlGenerator: Send + Sync {
    /// Parameterized single-row INSERT for the target, or an
    /// `INSERT … SELECT` body when a source table is given.
    fn insert_statement(
        &self,
        dialect: Dialect,
        target: &TableRef,
        columns: &[String],
        source: Option<&TableRef>,
    ) -> String;

    /// Multi-row INSERT with placeholders for `row_count` rows, used by
    /// the bulk append path.
    fn bulk_insert_statement(
        &self,
        dialect: Dialect,
        target: &TableRef,
        columns: &[String],
        row_count: usize,
    ) -> String;

    /// Set-based merge from staging into target.
    ///
    /// Fails with `InvalidArgument` when either column set is empty and
    /// with `SchemaResolution` when the dialect has no supported merge
    /// form.
    fn merge_statement(&self, request: &MergeStatement<'_>) -> LoadResult<String>;
}

/// Reference [`SqlGenerator`]: upsert via `ON CONFLICT` / `ON DUPLICATE
/// KEY` where the dialect has one, `MERGE INTO` elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardSqlGenerator;

impl SqlGenerator for StandardSqlGenerator {
    fn insert_statement(
        &self,
        dialect: Dialect,
        target: &TableRef,
        columns: &[String],
        source: Option<&TableRef>,
    ) -> String {
        let column_list = columns.join(", ");

        match source {
            Some(source) => format!(
                "INSERT INTO {} ({column_list}) SELECT {column_list} FROM {}",
                target.qualified(),
                source.qualified()
            ),
            None => format!(
                "INSERT INTO {} ({column_list}) VALUES ({})",
                target.qualified(),
                placeholder_row(dialect, columns.len(), 0)
            ),
        }
    }

    fn bulk_insert_statement(
        &self,
        dialect: Dialect,
        target: &TableRef,
        columns: &[String],
        row_count: usize,
    ) -> String {
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ",
            target.qualified(),
            columns.join(", ")
        );

        for row in 0..row_count {
            if row > 0 {
                sql.push_str(", ");
            }
            let _ = write!(
                sql,
                "({})",
                placeholder_row(dialect, columns.len(), row * columns.len())
            );
        }

        sql
    }

    fn merge_statement(&self, request: &MergeStatement<'_>) -> LoadResult<String> {
        if request.match_columns.is_empty() {
            return Err(LoadError::invalid_argument(
                "merge requires at least one match column",
            ));
        }
        if request.constraint_columns.is_empty() {
            return Err(LoadError::invalid_argument(
                "merge requires at least one constraint column",
            ));
        }

        let target = request.target.qualified();
        let staging = request.staging.qualified();
        let column_list = request.columns.join(", ");

        let sql = match request.dialect {
            Dialect::Postgres | Dialect::Sqlite => {
                let keys = join_set(request.match_columns, ", ");
                let updates = request
                    .constraint_columns
                    .iter()
                    .map(|column| format!("{column} = EXCLUDED.{column}"))
                    .collect::<Vec<_>>()
                    .join(", ");

                format!(
                    "INSERT INTO {target} ({column_list}) SELECT {column_list} FROM {staging} \
                     ON CONFLICT ({keys}) DO UPDATE SET {updates}"
                )
            }
            Dialect::Mysql => {
                let updates = request
                    .constraint_columns
                    .iter()
                    .map(|column| format!("{column} = VALUES({column})"))
                    .collect::<Vec<_>>()
                    .join(", ");

                format!(
                    "INSERT INTO {target} ({column_list}) SELECT {column_list} FROM {staging} \
                     ON DUPLICATE KEY UPDATE {updates}"
                )
            }
            Dialect::Mssql | Dialect::Oracle | Dialect::Redshift => {
                let predicate = request
                    .match_columns
                    .iter()
                    .map(|column| format!("tgt.{column} = src.{column}"))
                    .collect::<Vec<_>>()
                    .join(" AND ");
                let updates = request
                    .constraint_columns
                    .iter()
                    .map(|column| format!("tgt.{column} = src.{column}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let insert_values = request
                    .columns
                    .iter()
                    .map(|column| format!("src.{column}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let terminator = if request.dialect == Dialect::Mssql {
                    ";"
                } else {
                    ""
                };

                format!(
                    "MERGE INTO {target} tgt USING {staging} src ON ({predicate}) \
                     WHEN MATCHED THEN UPDATE SET {updates} \
                     WHEN NOT MATCHED THEN INSERT ({column_list}) VALUES ({insert_values}){terminator}"
                )
            }
            unsupported => {
                return Err(LoadError::schema_resolution(format!(
                    "dialect {unsupported} has no supported merge form"
                )));
            }
        };

        Ok(sql)
    }
}

/// Renders one parenthesized placeholder row, offsetting positional
/// indices for dialects that number their parameters.
fn placeholder_row(dialect: Dialect, width: usize, offset: usize) -> String {
    (0..width)
        .map(|i| dialect.placeholder(offset + i + 1))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_set(set: &BTreeSet<String>, separator: &str) -> String {
    set.iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}
