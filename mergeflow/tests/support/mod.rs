//! Shared fixtures for pipeline tests.

#![allow(dead_code)]

use mergeflow::schema::memory::MemoryIntrospector;
use mergeflow::types::{Cell, ColumnDescriptor, Dataset, Row, TableRef};

/// Initializes test tracing, ignoring repeat initialization.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// The canonical test target: `orders(id pk, status)`.
pub fn orders_table() -> TableRef {
    TableRef::new("orders")
}

/// Introspector fixture serving the `orders` schema.
pub fn orders_introspector() -> MemoryIntrospector {
    let introspector = MemoryIntrospector::new();
    introspector.add_table(
        &orders_table(),
        vec![
            ColumnDescriptor::new("id", "INTEGER", true, false),
            ColumnDescriptor::new("status", "TEXT", false, true),
        ],
    );

    introspector
}

/// Builds an `orders` dataset of `rows` sequential rows.
pub fn orders_dataset(rows: usize) -> Dataset {
    let mut dataset = Dataset::new(vec!["id".to_string(), "status".to_string()]);
    for i in 0..rows {
        dataset
            .push_row(Row::new(vec![Cell::I64(i as i64), Cell::from("open")]))
            .unwrap();
    }

    dataset
}
