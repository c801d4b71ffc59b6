//! Sinks for synthesized rows.

pub mod csv;
pub mod memory;
pub mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use bloatdb_core::Table;

use crate::errors::SeedError;
use crate::value::{Row, SeedValue, project};

/// One table's worth of rows.
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    pub table: &'a Table,
    /// 1-based position in the insertion plan.
    pub position: usize,
    pub rows: &'a [Row],
    /// Column indices whose committed values are reported back.
    pub tracked: &'a [usize],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    pub inserted: u64,
    /// Tracked projection of every row that landed, aligned with `tracked`.
    pub committed: Vec<Vec<SeedValue>>,
}

/// Commits a table's rows atomically. Rows colliding on a unique key are
/// skipped; anything else fails the whole table.
#[async_trait]
pub trait BatchWriter: Send {
    async fn write(&mut self, request: WriteRequest<'_>) -> Result<WriteOutcome, SeedError>;
}

/// Skip-on-conflict bookkeeping for writers without a database behind them.
///
/// Tracks every PRIMARY KEY/UNIQUE constraint as a value tuple, so a column
/// that is both key and foreign key still dedupes and a composite key only
/// collides when the whole tuple repeats.
#[derive(Debug, Default)]
pub(crate) struct UniqueGuard {
    keys: Vec<(Vec<usize>, HashSet<Vec<SeedValue>>)>,
}

impl UniqueGuard {
    pub(crate) fn for_table(table: &Table) -> Self {
        let keys = table
            .unique_keys()
            .into_iter()
            .map(|key| (key.columns, HashSet::new()))
            .collect();
        Self { keys }
    }

    /// Returns false when `row` collides with an admitted row. A tuple holding
    /// a NULL never collides.
    pub(crate) fn admit(&mut self, row: &[SeedValue]) -> bool {
        let tuples: Vec<Option<Vec<SeedValue>>> = self
            .keys
            .iter()
            .map(|(columns, _)| {
                let tuple = project(row, columns);
                (!tuple.iter().any(SeedValue::is_null)).then_some(tuple)
            })
            .collect();

        let collides = self
            .keys
            .iter()
            .zip(&tuples)
            .any(|((_, seen), tuple)| tuple.as_ref().is_some_and(|t| seen.contains(t)));
        if collides {
            return false;
        }
        for ((_, seen), tuple) in self.keys.iter_mut().zip(tuples) {
            if let Some(tuple) = tuple {
                seen.insert(tuple);
            }
        }
        true
    }
}
