//! Postgres implementations of the mergeflow collaborator traits.
//!
//! [`PgEngine`] provides transactional sessions over a sqlx pool,
//! [`PgIntrospector`] reads column and primary-key metadata from
//! `information_schema`, and [`PgSourceReader`] materializes query
//! results as datasets, optionally in parallel row ranges.

mod extract;
mod introspect;
mod session;

pub use extract::PgSourceReader;
pub use introspect::PgIntrospector;
pub use session::{PgEngine, PgSession};
