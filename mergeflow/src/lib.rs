//! Staging-and-merge loading of tabular data into relational stores.
//!
//! A loaded dataset is written to a target table either as a plain
//! partitioned insert or as an idempotent merge: a dialect-correct
//! temporary staging table is provisioned from the live target schema,
//! loaded concurrently in chunks, and folded into the target with one
//! set-based merge statement.

pub mod config;
pub mod dialect;
pub mod error;
pub mod insert;
pub mod loader;
pub mod merge;
pub mod partition;
pub mod schema;
pub mod session;
pub mod source;
pub mod sqlgen;
pub mod staging;
pub mod types;

pub use error::{LoadError, LoadResult, PartitionFailure};
pub use loader::Loader;
