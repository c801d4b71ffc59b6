use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use bloatdb_core::DatabaseSchema;
use bloatdb_plan::InsertionPlan;

use crate::errors::SeedError;
use crate::model::{SeedOptions, SeedReport, TableReport};
use crate::sampler::PopulatedRowIndex;
use crate::synth::{SynthOptions, ValueSynthesizer};
use crate::writer::{BatchWriter, WriteRequest};

/// Drives a seeding run: one table at a time, in plan order.
#[derive(Debug, Clone, Default)]
pub struct SeedEngine {
    options: SeedOptions,
}

impl SeedEngine {
    pub fn new(options: SeedOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SeedOptions {
        &self.options
    }

    /// Seed every planned table through `writer`.
    ///
    /// A table's rows are committed before the next table is synthesized, so
    /// foreign keys only ever sample rows that exist. The first fatal error
    /// stops the run; tables committed before it stay committed.
    pub async fn run<W>(
        &self,
        schema: &DatabaseSchema,
        plan: &InsertionPlan,
        excluded: &[String],
        writer: &mut W,
    ) -> Result<SeedReport, SeedError>
    where
        W: BatchWriter + ?Sized,
    {
        let start = Instant::now();
        let seed = self.options.seed.unwrap_or_else(rand::random);
        let synth_options = SynthOptions {
            timestamp_floor: self.options.timestamp_floor,
            timestamp_ceiling: self
                .options
                .timestamp_ceiling
                .unwrap_or_else(|| Utc::now().naive_utc()),
            token_length: self.options.token_length,
        };

        info!(
            event = "seed_started",
            seed,
            tables = plan.len(),
            excluded = excluded.len(),
            "seeding started"
        );
        for table in excluded {
            warn!(
                event = "table_excluded",
                table = %table,
                reason = "circular foreign keys",
                "table skipped"
            );
        }

        let mut index = PopulatedRowIndex::for_schema(schema);
        let mut report = SeedReport {
            seed,
            tables: Vec::with_capacity(plan.len()),
            excluded: excluded.to_vec(),
        };

        for (offset, name) in plan.iter().enumerate() {
            let position = offset + 1;
            let table_start = Instant::now();
            let table = schema.table(name).ok_or_else(|| SeedError::UnknownTable {
                table: name.to_string(),
            })?;
            let requested = self.options.rows_for(name);

            let mut synth = ValueSynthesizer::for_table(synth_options.clone(), seed, name);
            let rows = (0..requested)
                .map(|_| synth.synthesize_row(table, &index))
                .collect::<Result<Vec<_>, _>>()?;

            let tracked = index.tracked_columns(table);
            let outcome = writer
                .write(WriteRequest {
                    table,
                    position,
                    rows: &rows,
                    tracked: &tracked,
                })
                .await?;
            index.ingest(table, &tracked, outcome.committed)?;

            let table_report = TableReport {
                position,
                table: name.to_string(),
                rows_requested: requested,
                rows_inserted: outcome.inserted,
                rows_skipped: requested.saturating_sub(outcome.inserted),
            };
            if table_report.rows_skipped > 0 {
                warn!(
                    event = "rows_skipped",
                    table = %name,
                    skipped = table_report.rows_skipped,
                    "duplicate keys skipped"
                );
            }
            info!(
                event = "table_seeded",
                position,
                table = %name,
                requested,
                inserted = table_report.rows_inserted,
                duration_ms = table_start.elapsed().as_millis() as u64,
                "table seeded"
            );
            report.tables.push(table_report);
        }

        info!(
            event = "seed_completed",
            seed,
            tables = report.tables.len(),
            inserted = report.total_inserted(),
            duration_ms = start.elapsed().as_millis() as u64,
            "seeding completed"
        );
        Ok(report)
    }
}
