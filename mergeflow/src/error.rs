//! Error types for staging-and-merge operations.

use thiserror::Error;

/// Result type for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that can occur while loading or merging data.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A required argument was missing or inconsistent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Schema introspection failed, or the connected dialect cannot express
    /// the required DDL.
    #[error("schema resolution failed: {0}")]
    SchemaResolution(String),

    /// A statement was rejected by the engine.
    #[error("statement execution failed: {message}")]
    Execution {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// One or more partitions failed during a fan-out load. Sibling
    /// partitions are never aborted; their failures are collected here
    /// after all of them have completed.
    #[error("{} of {total} partitions failed to load", failures.len())]
    PartitionFailures {
        total: usize,
        failures: Vec<PartitionFailure>,
    },

    /// I/O error, e.g. while resolving a `.sql` query file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    /// Creates an [`LoadError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        LoadError::InvalidArgument(message.into())
    }

    /// Creates an [`LoadError::SchemaResolution`].
    pub fn schema_resolution(message: impl Into<String>) -> Self {
        LoadError::SchemaResolution(message.into())
    }

    /// Creates an [`LoadError::Execution`] without an underlying source.
    pub fn execution(message: impl Into<String>) -> Self {
        LoadError::Execution {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an [`LoadError::Execution`] wrapping the driver error that
    /// caused it.
    pub fn execution_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LoadError::Execution {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// A single partition's failed insert, reported in aggregate through
/// [`LoadError::PartitionFailures`].
#[derive(Debug)]
pub struct PartitionFailure {
    /// Index of the partition within the partition sequence.
    pub index: usize,
    /// Number of rows the partition carried.
    pub rows: usize,
    /// The failure itself.
    pub error: Box<LoadError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_failures_display_counts() {
        let error = LoadError::PartitionFailures {
            total: 3,
            failures: vec![PartitionFailure {
                index: 2,
                rows: 2000,
                error: Box::new(LoadError::execution("duplicate key")),
            }],
        };

        assert_eq!(error.to_string(), "1 of 3 partitions failed to load");
    }

    #[test]
    fn execution_preserves_source() {
        let source = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let error = LoadError::execution_with_source("insert rejected", source);

        assert!(std::error::Error::source(&error).is_some());
    }
}
