//! Constraint-aware row synthesis and batch writing for bloatdb.
//!
//! Tables are processed strictly in insertion order: rows are synthesized,
//! written in one transaction, and the committed key values feed the sampler
//! used by every later foreign-key column.

pub mod engine;
pub mod errors;
pub mod import;
pub mod model;
pub mod sampler;
pub mod synth;
pub mod value;
pub mod writer;

pub use engine::SeedEngine;
pub use errors::SeedError;
pub use import::{ImportReport, ImportedTable, import_csv_dir};
pub use model::{SeedOptions, SeedReport, TableReport};
pub use sampler::{PopulatedRowIndex, RowSampler};
pub use synth::{SynthOptions, ValueSynthesizer, hash_seed};
pub use value::{Row, SeedValue};
pub use writer::csv::CsvWriter;
pub use writer::memory::MemoryWriter;
pub use writer::postgres::{PgBatchWriter, truncate_tables};
pub use writer::{BatchWriter, WriteOutcome, WriteRequest};
