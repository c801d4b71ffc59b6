use std::collections::{BTreeMap, BTreeSet};

use bloatdb_core::{DatabaseSchema, Table};
use rand::RngCore;
use rand::seq::IndexedRandom;
use tracing::debug;

use crate::errors::SeedError;
use crate::value::SeedValue;

/// Source of already-committed values for foreign-key columns.
pub trait RowSampler {
    /// Committed values of `table.column`; empty until the table is ingested.
    fn committed(&self, table: &str, column: &str) -> &[SeedValue];

    /// Uniform pick over the committed values.
    fn pick(&self, table: &str, column: &str, rng: &mut dyn RngCore) -> Option<SeedValue> {
        self.committed(table, column).choose(rng).cloned()
    }
}

/// Committed values of every FK target column, filled table by table.
#[derive(Debug, Default)]
pub struct PopulatedRowIndex {
    tracked: BTreeMap<String, BTreeSet<String>>,
    values: BTreeMap<String, BTreeMap<String, Vec<SeedValue>>>,
    sealed: BTreeSet<String>,
}

impl PopulatedRowIndex {
    /// Track every column some foreign key in `schema` points at.
    pub fn for_schema(schema: &DatabaseSchema) -> Self {
        let mut tracked: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (table, column) in schema.referenced_columns() {
            tracked.entry(table).or_default().insert(column);
        }
        Self {
            tracked,
            ..Self::default()
        }
    }

    /// Indices of `table`'s columns whose committed values must be kept.
    pub fn tracked_columns(&self, table: &Table) -> Vec<usize> {
        let Some(columns) = self.tracked.get(&table.name) else {
            return Vec::new();
        };
        table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| columns.contains(&column.name))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Record what actually landed for `table`. Each committed row is aligned
    /// with `tracked`. A table can be ingested once.
    pub fn ingest(
        &mut self,
        table: &Table,
        tracked: &[usize],
        committed: Vec<Vec<SeedValue>>,
    ) -> Result<(), SeedError> {
        if !self.sealed.insert(table.name.clone()) {
            return Err(SeedError::AlreadyCommitted {
                table: table.name.clone(),
            });
        }

        let mut columns: BTreeMap<String, Vec<SeedValue>> = tracked
            .iter()
            .filter_map(|idx| table.columns.get(*idx))
            .map(|column| (column.name.clone(), Vec::with_capacity(committed.len())))
            .collect();

        for row in committed {
            for (idx, value) in tracked.iter().zip(row) {
                if value.is_null() {
                    continue;
                }
                if let Some(column) = table.columns.get(*idx)
                    && let Some(values) = columns.get_mut(&column.name)
                {
                    values.push(value);
                }
            }
        }

        debug!(
            event = "committed_values_indexed",
            table = %table.name,
            columns = columns.len(),
            "indexed committed values"
        );
        self.values.insert(table.name.clone(), columns);
        Ok(())
    }

    pub fn is_sealed(&self, table: &str) -> bool {
        self.sealed.contains(table)
    }
}

impl RowSampler for PopulatedRowIndex {
    fn committed(&self, table: &str, column: &str) -> &[SeedValue] {
        self.values
            .get(table)
            .and_then(|columns| columns.get(column))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
