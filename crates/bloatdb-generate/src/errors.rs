use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted while seeding.
///
/// Every variant that can abort a run names the table it happened on.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("{table}.{column} references {referenced_table}.{referenced_column}, which has no committed rows")]
    EmptyReferencedTable {
        table: String,
        column: String,
        referenced_table: String,
        referenced_column: String,
    },
    #[error("{table}.{column} has unsupported type '{data_type}'")]
    UnsupportedColumnType {
        table: String,
        column: String,
        data_type: String,
    },
    #[error("{kind} violation on {table}: {message}")]
    ConstraintViolation {
        table: String,
        kind: String,
        message: String,
    },
    #[error("connection failed while writing {table}: {source}")]
    Connectivity {
        table: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("database error while writing {table}: {source}")]
    Database {
        table: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("committed rows for {table} were already recorded")]
    AlreadyCommitted { table: String },
    #[error("planned table {table} is not in the schema")]
    UnknownTable { table: String },
    #[error("no export for {table} in {}", dir.display())]
    MissingExport { table: String, dir: PathBuf },
    #[error("export {} does not fit {table}: {message}", path.display())]
    ExportMismatch {
        table: String,
        path: PathBuf,
        message: String,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl SeedError {
    /// Table the error is attributed to, when there is one.
    pub fn table(&self) -> Option<&str> {
        match self {
            SeedError::EmptyReferencedTable { table, .. }
            | SeedError::UnsupportedColumnType { table, .. }
            | SeedError::ConstraintViolation { table, .. }
            | SeedError::Connectivity { table, .. }
            | SeedError::Database { table, .. }
            | SeedError::AlreadyCommitted { table }
            | SeedError::UnknownTable { table }
            | SeedError::MissingExport { table, .. }
            | SeedError::ExportMismatch { table, .. } => Some(table),
            SeedError::Io(_) | SeedError::Csv(_) => None,
        }
    }
}
