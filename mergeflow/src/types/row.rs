use crate::error::{LoadError, LoadResult};
use crate::types::cell::Cell;

/// A single row of data, values ordered to match the dataset's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Cell>,
}

impl Row {
    /// Creates a row from cell values in dataset column order.
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Returns the row values in dataset column order.
    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Consumes the row and returns its values.
    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }

    /// Returns the number of values in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the row has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An in-memory tabular dataset: named columns plus rows of [`Cell`]s.
///
/// Every row's arity is checked against the column list on insertion, so
/// downstream code can rely on positional access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Creates an empty dataset with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row, validating its arity against the column list.
    pub fn push_row(&mut self, row: Row) -> LoadResult<()> {
        if row.len() != self.columns.len() {
            return Err(LoadError::invalid_argument(format!(
                "row has {} values but the dataset has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);

        Ok(())
    }

    /// Returns the column names in table order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows in insertion order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates one row as ordered `(column name, value)` pairs.
    pub fn named_values<'a>(
        &'a self,
        row: &'a Row,
    ) -> impl Iterator<Item = (&'a str, &'a Cell)> + 'a {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(row.values().iter())
    }
}
