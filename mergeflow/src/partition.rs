//! Dataset partitioning for the fan-out load phase.

use std::collections::HashMap;

use crate::error::{LoadError, LoadResult};
use crate::types::{Dataset, Row};

/// One ordered, non-overlapping slice of a dataset.
///
/// The full partition sequence produced for a dataset covers its rows
/// exactly once; `index` is the partition's position in that sequence.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Position within the partition sequence.
    pub index: usize,
    /// The rows of this slice, in dataset order.
    pub rows: Vec<Row>,
}

impl Partition {
    /// Returns the number of rows in the partition.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the partition carries no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Trait for splitting a dataset into ordered partitions.
pub trait Partitioner: Send + Sync {
    /// Splits the dataset into partitions of at most `chunk_size` rows.
    ///
    /// With a `group_column`, rows are first grouped by that column's
    /// value (groups ordered by first appearance) and each group is
    /// chunked separately; without one, the dataset is chunked in row
    /// order. Either way the result covers the dataset exactly once.
    fn partition(
        &self,
        dataset: &Dataset,
        chunk_size: usize,
        group_column: Option<&str>,
    ) -> LoadResult<Vec<Partition>>;
}

/// Reference partitioner: contiguous row-count chunks, with optional
/// grouping by a column's value.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCountPartitioner;

impl Partitioner for RowCountPartitioner {
    fn partition(
        &self,
        dataset: &Dataset,
        chunk_size: usize,
        group_column: Option<&str>,
    ) -> LoadResult<Vec<Partition>> {
        if chunk_size == 0 {
            return Err(LoadError::invalid_argument(
                "chunk_size must be greater than 0",
            ));
        }

        let groups: Vec<Vec<Row>> = match group_column {
            None => vec![dataset.rows().to_vec()],
            Some(column) => group_rows(dataset, column)?,
        };

        let mut partitions = Vec::new();
        for group in groups {
            for chunk in group.chunks(chunk_size) {
                partitions.push(Partition {
                    index: partitions.len(),
                    rows: chunk.to_vec(),
                });
            }
        }

        Ok(partitions)
    }
}

/// Groups rows by the rendered value of `column`, preserving first
/// appearance order of groups and row order within each group.
fn group_rows(dataset: &Dataset, column: &str) -> LoadResult<Vec<Vec<Row>>> {
    let position = dataset
        .columns()
        .iter()
        .position(|name| name == column)
        .ok_or_else(|| {
            LoadError::invalid_argument(format!("partition column '{column}' not in dataset"))
        })?;

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();

    for row in dataset.rows() {
        let key = format!("{:?}", row.values()[position]);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(row.clone());
    }

    Ok(order
        .into_iter()
        .map(|key| groups.remove(&key).unwrap_or_default())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    fn dataset_of(n: usize) -> Dataset {
        let mut dataset = Dataset::new(vec!["id".to_string(), "bucket".to_string()]);
        for i in 0..n {
            dataset
                .push_row(Row::new(vec![
                    Cell::I64(i as i64),
                    Cell::String(format!("b{}", i % 3)),
                ]))
                .unwrap();
        }
        dataset
    }

    #[test]
    fn covers_every_row_exactly_once_in_order() {
        let dataset = dataset_of(12000);

        let partitions = RowCountPartitioner
            .partition(&dataset, 5000, None)
            .unwrap();

        let sizes: Vec<_> = partitions.iter().map(Partition::len).collect();
        assert_eq!(sizes, vec![5000, 5000, 2000]);

        let ids: Vec<i64> = partitions
            .iter()
            .flat_map(|p| p.rows.iter())
            .map(|row| match row.values()[0] {
                Cell::I64(id) => id,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ids, (0..12000).collect::<Vec<_>>());
    }

    #[test]
    fn group_column_partitions_each_group_separately() {
        let dataset = dataset_of(9);

        let partitions = RowCountPartitioner
            .partition(&dataset, 2, Some("bucket"))
            .unwrap();

        // Three groups of three rows, each chunked as 2 + 1.
        assert_eq!(partitions.len(), 6);
        let total: usize = partitions.iter().map(Partition::len).sum();
        assert_eq!(total, 9);

        // First group holds ids 0, 3, 6 (bucket b0) in original order.
        let first_ids: Vec<i64> = partitions[0]
            .rows
            .iter()
            .chain(partitions[1].rows.iter())
            .map(|row| match row.values()[0] {
                Cell::I64(id) => id,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(first_ids, vec![0, 3, 6]);
    }

    #[test]
    fn zero_chunk_size_is_invalid() {
        let dataset = dataset_of(3);

        let result = RowCountPartitioner.partition(&dataset, 0, None);

        assert!(matches!(result, Err(LoadError::InvalidArgument(_))));
    }

    #[test]
    fn unknown_group_column_is_invalid() {
        let dataset = dataset_of(3);

        let result = RowCountPartitioner.partition(&dataset, 2, Some("region"));

        assert!(matches!(result, Err(LoadError::InvalidArgument(_))));
    }
}
