use std::fs;
use std::path::{Path, PathBuf};

use sqlx::PgConnection;
use tracing::{debug, info};

use bloatdb_core::types::quote_ident;
use bloatdb_core::{DatabaseSchema, Table};
use bloatdb_plan::InsertionPlan;

use crate::errors::SeedError;
use crate::writer::postgres::classify;

/// One table loaded from an export directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedTable {
    pub position: usize,
    pub table: String,
    pub path: PathBuf,
    pub rows: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub tables: Vec<ImportedTable>,
}

impl ImportReport {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|table| table.rows).sum()
    }
}

/// Load every planned table from `dir` with `COPY ... FROM STDIN`.
///
/// Each table is its own COPY and commits on its own; the first failure
/// stops the run and leaves earlier tables loaded.
pub async fn import_csv_dir(
    conn: &mut PgConnection,
    schema: &DatabaseSchema,
    plan: &InsertionPlan,
    dir: &Path,
) -> Result<ImportReport, SeedError> {
    let mut report = ImportReport::default();

    for (offset, name) in plan.iter().enumerate() {
        let position = offset + 1;
        let table = schema.table(name).ok_or_else(|| SeedError::UnknownTable {
            table: name.to_string(),
        })?;
        let path = find_export(dir, position, name)?;
        let header = read_header(table, &path)?;
        let statement = copy_statement(table, &header);
        let bytes = fs::read(&path)?;

        debug!(
            event = "copy_started",
            table = %name,
            path = %path.display(),
            bytes = bytes.len(),
            "copy started"
        );

        let mut copy = conn
            .copy_in_raw(&statement)
            .await
            .map_err(|err| classify(name, err))?;
        copy.send(bytes).await.map_err(|err| classify(name, err))?;
        let rows = copy.finish().await.map_err(|err| classify(name, err))?;

        info!(
            event = "table_imported",
            table = %name,
            path = %path.display(),
            rows,
            "table imported"
        );
        report.tables.push(ImportedTable {
            position,
            table: name.to_string(),
            path,
            rows,
        });
    }

    info!(
        event = "import_finished",
        tables = report.tables.len(),
        rows = report.total_rows(),
        "import finished"
    );
    Ok(report)
}

/// Locate the export for `table`: `<position>_<table>.csv`, or failing that
/// the latest dated `<position>_<table>_<YYYYMMDD>.csv`.
pub fn find_export(dir: &Path, position: usize, table: &str) -> Result<PathBuf, SeedError> {
    let exact = dir.join(format!("{position}_{table}.csv"));
    if exact.is_file() {
        return Ok(exact);
    }

    let prefix = format!("{position}_{table}_");
    let mut latest: Option<(String, PathBuf)> = None;
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(SeedError::MissingExport {
                table: table.to_string(),
                dir: dir.to_path_buf(),
            });
        }
        Err(err) => return Err(err.into()),
    };
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(stamp) = file_name
            .to_str()
            .and_then(|name| name.strip_prefix(&prefix))
            .and_then(|rest| rest.strip_suffix(".csv"))
        else {
            continue;
        };
        if stamp.len() != 8 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if latest.as_ref().is_none_or(|(best, _)| stamp > best.as_str()) {
            latest = Some((stamp.to_string(), entry.path()));
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| SeedError::MissingExport {
            table: table.to_string(),
            dir: dir.to_path_buf(),
        })
}

/// Read the header row and check every name against the table's columns.
pub fn read_header(table: &Table, path: &Path) -> Result<Vec<String>, SeedError> {
    let mismatch = |message: String| SeedError::ExportMismatch {
        table: table.name.clone(),
        path: path.to_path_buf(),
        message,
    };

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header.iter().all(|name| name.is_empty()) {
        return Err(mismatch("header row is empty".to_string()));
    }

    for name in &header {
        if table.column(name).is_none() {
            return Err(mismatch(format!("unknown column {name}")));
        }
    }
    // NOT NULL columns with a default may be left to the database.
    let needed = table
        .columns
        .iter()
        .filter(|column| column.required && column.default.is_none());
    for column in needed {
        if !header.contains(&column.name) {
            return Err(mismatch(format!("required column {} is missing", column.name)));
        }
    }
    Ok(header)
}

/// `COPY` statement loading `header` columns of `table` from CSV on stdin.
pub fn copy_statement(table: &Table, header: &[String]) -> String {
    let columns = header
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "COPY {} ({columns}) FROM STDIN WITH (FORMAT csv, HEADER true)",
        quote_ident(&table.name)
    )
}
