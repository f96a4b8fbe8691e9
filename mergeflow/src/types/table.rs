use std::fmt;

/// A reference to a table, with an optional schema qualifier.
///
/// [`TableRef`] is an immutable value: the qualified form is
/// `schema.table` when a schema is present and `table` otherwise.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TableRef {
    /// The name of the table.
    pub name: String,
    /// The schema containing the table, if any.
    pub schema: Option<String>,
}

impl TableRef {
    /// Creates an unqualified table reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
        }
    }

    /// Creates a schema-qualified table reference.
    pub fn with_schema(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Some(schema.into()),
        }
    }

    /// Returns the qualified identifier used in generated SQL.
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}
