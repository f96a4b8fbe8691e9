use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};

/// Partition-loading configuration shared by insert and merge pipelines.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoadConfig {
    /// Maximum number of rows per partition.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Upper bound on partitions written concurrently.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Optional column whose values group rows into partitions before
    /// chunking.
    #[serde(default)]
    pub partition_by: Option<String>,
}

impl LoadConfig {
    /// Default maximum rows per partition.
    pub const DEFAULT_CHUNK_SIZE: usize = 5000;

    /// Default concurrent-partition bound.
    pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

    /// Validates configuration settings.
    ///
    /// Ensures chunk size and the concurrency bound are non-zero.
    pub fn validate(&self) -> LoadResult<()> {
        if self.chunk_size == 0 {
            return Err(LoadError::invalid_argument(
                "load.chunk_size must be greater than 0",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(LoadError::invalid_argument(
                "load.max_concurrency must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_concurrency: default_max_concurrency(),
            partition_by: None,
        }
    }
}

fn default_chunk_size() -> usize {
    LoadConfig::DEFAULT_CHUNK_SIZE
}

fn default_max_concurrency() -> usize {
    LoadConfig::DEFAULT_MAX_CONCURRENCY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = LoadConfig::default();
        assert_eq!(config.chunk_size, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = LoadConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
