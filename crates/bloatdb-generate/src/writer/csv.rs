use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::errors::SeedError;
use crate::value::project;
use crate::writer::{BatchWriter, UniqueGuard, WriteOutcome, WriteRequest};

/// Writes each table to `<dir>/<position>_<table>.csv` instead of a database.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    dir: PathBuf,
}

impl CsvWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SeedError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, position: usize, table: &str) -> PathBuf {
        self.dir.join(format!("{position}_{table}.csv"))
    }
}

#[async_trait]
impl BatchWriter for CsvWriter {
    async fn write(&mut self, request: WriteRequest<'_>) -> Result<WriteOutcome, SeedError> {
        let table = request.table;
        let path = self.table_path(request.position, &table.name);

        let counting = CountingWriter::new(BufWriter::new(File::create(&path)?));
        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(counting);

        let header: Vec<&str> = table.columns.iter().map(|col| col.name.as_str()).collect();
        writer.write_record(&header)?;

        let mut guard = UniqueGuard::for_table(table);
        let mut committed = Vec::new();
        let mut inserted = 0_u64;
        for row in request.rows {
            if !guard.admit(row) {
                continue;
            }
            writer.write_record(row.iter().map(|value| value.to_csv()))?;
            committed.push(project(row, request.tracked));
            inserted += 1;
        }

        writer.flush()?;
        let counting = writer.into_inner().map_err(|err| err.into_error())?;

        info!(
            event = "table_exported",
            table = %table.name,
            path = %path.display(),
            rows = inserted,
            bytes_written = counting.bytes_written(),
            "table exported"
        );

        Ok(WriteOutcome {
            inserted,
            committed,
        })
    }
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
