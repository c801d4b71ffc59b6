use std::collections::BTreeMap;

use async_trait::async_trait;
use bloatdb_core::Table;
use tracing::debug;

use crate::errors::SeedError;
use crate::value::{Row, SeedValue, project};
use crate::writer::{BatchWriter, UniqueGuard, WriteOutcome, WriteRequest};

#[derive(Debug, Clone)]
struct StoredTable {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// In-memory sink used for dry runs and tests.
///
/// Mirrors what Postgres would enforce for the seeded constraints: duplicate
/// PRIMARY KEY/UNIQUE values are skipped, NULLs in required columns and
/// dangling foreign keys fail the table.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    tables: BTreeMap<String, StoredTable>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(|stored| stored.rows.as_slice())
            .unwrap_or(&[])
    }

    pub fn column_values(&self, table: &str, column: &str) -> Vec<SeedValue> {
        let Some(stored) = self.tables.get(table) else {
            return Vec::new();
        };
        let Some(idx) = stored.columns.iter().position(|name| name == column) else {
            return Vec::new();
        };
        stored
            .rows
            .iter()
            .filter_map(|row| row.get(idx).cloned())
            .collect()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn check_row(&self, table: &Table, row: &[SeedValue]) -> Result<(), SeedError> {
        for (column, value) in table.columns.iter().zip(row) {
            if value.is_null() {
                if column.required {
                    return Err(SeedError::ConstraintViolation {
                        table: table.name.clone(),
                        kind: "not null".to_string(),
                        message: format!("null value in column \"{}\"", column.name),
                    });
                }
                continue;
            }
            let Some(fk) = column.foreign_key() else {
                continue;
            };
            let exists = self
                .tables
                .get(&fk.table)
                .and_then(|stored| {
                    let idx = stored.columns.iter().position(|name| *name == fk.column)?;
                    Some(stored.rows.iter().any(|row| row.get(idx) == Some(value)))
                })
                .unwrap_or(false);
            if !exists {
                return Err(SeedError::ConstraintViolation {
                    table: table.name.clone(),
                    kind: "foreign key".to_string(),
                    message: format!(
                        "{}.{} value is not present in {}.{}",
                        table.name, column.name, fk.table, fk.column
                    ),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BatchWriter for MemoryWriter {
    async fn write(&mut self, request: WriteRequest<'_>) -> Result<WriteOutcome, SeedError> {
        let table = request.table;
        let mut guard = UniqueGuard::for_table(table);
        for existing in self.rows(&table.name) {
            guard.admit(existing);
        }
        let mut admitted = Vec::with_capacity(request.rows.len());

        for row in request.rows {
            self.check_row(table, row)?;
            if guard.admit(row) {
                admitted.push(row.clone());
            }
        }

        let committed = admitted
            .iter()
            .map(|row| project(row, request.tracked))
            .collect();
        let inserted = admitted.len() as u64;

        let stored = self
            .tables
            .entry(table.name.clone())
            .or_insert_with(|| StoredTable {
                columns: table.columns.iter().map(|c| c.name.clone()).collect(),
                rows: Vec::new(),
            });
        stored.rows.extend(admitted);

        debug!(
            event = "table_buffered",
            table = %table.name,
            inserted,
            skipped = request.rows.len() as u64 - inserted,
            "rows buffered in memory"
        );

        Ok(WriteOutcome {
            inserted,
            committed,
        })
    }
}
