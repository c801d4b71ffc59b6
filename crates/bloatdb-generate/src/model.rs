use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::synth::SynthOptions;

/// Options for a seeding run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedOptions {
    /// Rows requested for tables without an override.
    pub rows_per_table: u64,
    /// Per-table row overrides.
    #[serde(default)]
    pub table_rows: BTreeMap<String, u64>,
    /// Run seed; a random one is drawn (and logged) when absent.
    pub seed: Option<u64>,
    /// Upper bound on rows per INSERT statement.
    pub page_rows: usize,
    pub timestamp_floor: NaiveDateTime,
    /// Defaults to the run's start time.
    pub timestamp_ceiling: Option<NaiveDateTime>,
    pub token_length: usize,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            rows_per_table: 100,
            table_rows: BTreeMap::new(),
            seed: None,
            page_rows: 1000,
            timestamp_floor: SynthOptions::default_floor(),
            timestamp_ceiling: None,
            token_length: 12,
        }
    }
}

impl SeedOptions {
    pub fn rows_for(&self, table: &str) -> u64 {
        self.table_rows
            .get(table)
            .copied()
            .unwrap_or(self.rows_per_table)
    }
}

/// Summary of one seeded table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub position: usize,
    pub table: String,
    pub rows_requested: u64,
    pub rows_inserted: u64,
    /// Rows dropped by the skip-on-conflict policy.
    pub rows_skipped: u64,
}

/// Report for a seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub seed: u64,
    pub tables: Vec<TableReport>,
    /// Circular tables left out of the run.
    pub excluded: Vec<String>,
}

impl SeedReport {
    pub fn total_inserted(&self) -> u64 {
        self.tables.iter().map(|table| table.rows_inserted).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|table| table.table == name)
    }
}
