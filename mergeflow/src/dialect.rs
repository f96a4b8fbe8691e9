//! SQL dialect identification and per-engine syntax differences.

use std::fmt;
use std::str::FromStr;

use crate::error::{LoadError, LoadResult};

/// SQL dialect of a connected relational engine.
///
/// The set is closed: engines the staging protocol cannot provision a
/// temporary table for are still named here, so that the failure is an
/// explicit unsupported-dialect error instead of malformed DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    Mysql,
    Sqlite,
    Mssql,
    Oracle,
    Redshift,
    Db2,
    Teradata,
    Hana,
    Snowflake,
    BigQuery,
}

impl Dialect {
    /// Returns the canonical lowercase name of the dialect, matching what
    /// drivers report for a live connection.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgresql",
            Dialect::Mysql => "mysql",
            Dialect::Sqlite => "sqlite",
            Dialect::Mssql => "mssql",
            Dialect::Oracle => "oracle",
            Dialect::Redshift => "redshift",
            Dialect::Db2 => "db2",
            Dialect::Teradata => "teradata",
            Dialect::Hana => "hana",
            Dialect::Snowflake => "snowflake",
            Dialect::BigQuery => "bigquery",
        }
    }

    /// Returns the DDL header that introduces a temporary table in this
    /// dialect, or `None` when the staging protocol does not support the
    /// engine's temporary tables.
    ///
    /// Headers keep the exact spacing required for substitution into a
    /// rendered `CREATE TABLE ` statement; the Mssql header deliberately
    /// ends in `##` so the substitution produces a global temp table name.
    pub fn temp_table_header(&self) -> Option<&'static str> {
        match self {
            Dialect::Postgres | Dialect::Sqlite | Dialect::Redshift => Some("CREATE TEMP TABLE "),
            Dialect::Mysql => Some("CREATE TEMPORARY TABLE "),
            Dialect::Oracle => Some("CREATE GLOBAL TEMPORARY TABLE "),
            Dialect::Mssql => Some("CREATE TABLE ##"),
            Dialect::Db2
            | Dialect::Teradata
            | Dialect::Hana
            | Dialect::Snowflake
            | Dialect::BigQuery => None,
        }
    }

    /// Returns whether staging tables in this dialect live under a
    /// `##`-prefixed global name that all later references must use.
    pub fn uses_global_temp_prefix(&self) -> bool {
        matches!(self, Dialect::Mssql)
    }

    /// Returns whether the staging protocol can provision a temporary
    /// table for this dialect.
    pub fn supports_temp_tables(&self) -> bool {
        self.temp_table_header().is_some()
    }

    /// Renders the 1-based positional parameter placeholder used in
    /// parameterized statements for this dialect.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres | Dialect::Redshift => format!("${index}"),
            Dialect::Mssql => format!("@P{index}"),
            Dialect::Oracle => format!(":{index}"),
            _ => "?".to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = LoadError;

    fn from_str(s: &str) -> LoadResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::Mysql),
            "sqlite" => Ok(Dialect::Sqlite),
            "mssql" | "sqlserver" => Ok(Dialect::Mssql),
            "oracle" => Ok(Dialect::Oracle),
            "redshift" => Ok(Dialect::Redshift),
            "db2" => Ok(Dialect::Db2),
            "teradata" => Ok(Dialect::Teradata),
            "hana" => Ok(Dialect::Hana),
            "snowflake" => Ok(Dialect::Snowflake),
            "bigquery" => Ok(Dialect::BigQuery),
            other => Err(LoadError::invalid_argument(format!(
                "unknown dialect '{other}'"
            ))),
        }
    }
}
