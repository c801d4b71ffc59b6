use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::postgres::PgRow;
use sqlx::query_builder::Separated;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder, Row as _};
use tracing::{debug, info};
use uuid::Uuid;

use bloatdb_core::types::quote_ident;
use bloatdb_core::{Column, ColumnKind, IntWidth, Table};

use crate::errors::SeedError;
use crate::value::SeedValue;
use crate::writer::{BatchWriter, WriteOutcome, WriteRequest};

/// Postgres caps a statement at 65535 bind parameters.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Writes each table in one transaction on a borrowed connection.
pub struct PgBatchWriter<'c> {
    conn: &'c mut PgConnection,
    page_rows: usize,
}

impl<'c> PgBatchWriter<'c> {
    pub fn new(conn: &'c mut PgConnection, page_rows: usize) -> Self {
        Self {
            conn,
            page_rows: page_rows.max(1),
        }
    }
}

#[async_trait]
impl BatchWriter for PgBatchWriter<'_> {
    async fn write(&mut self, request: WriteRequest<'_>) -> Result<WriteOutcome, SeedError> {
        let table = request.table;
        if request.rows.is_empty() {
            return Ok(WriteOutcome::default());
        }

        // Nullable columns the engine cannot synthesize keep their default.
        let insert_columns: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.kind.is_supported() || column.required)
            .map(|(idx, _)| idx)
            .collect();
        let page_size = rows_per_statement(insert_columns.len(), self.page_rows);

        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|err| classify(&table.name, err))?;

        let mut outcome = WriteOutcome::default();
        for page in request.rows.chunks(page_size) {
            let mut builder = insert_statement(table, &insert_columns, page);
            if request.tracked.is_empty() {
                let result = builder
                    .build()
                    .execute(&mut *tx)
                    .await
                    .map_err(|err| classify(&table.name, err))?;
                outcome.inserted += result.rows_affected();
            } else {
                push_returning(&mut builder, table, request.tracked);
                let rows = builder
                    .build()
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(|err| classify(&table.name, err))?;
                outcome.inserted += rows.len() as u64;
                for row in &rows {
                    let values = decode_tracked(table, request.tracked, row)
                        .map_err(|err| classify(&table.name, err))?;
                    outcome.committed.push(values);
                }
            }
            debug!(
                event = "page_written",
                table = %table.name,
                rows = page.len(),
                "insert page executed"
            );
        }

        tx.commit()
            .await
            .map_err(|err| classify(&table.name, err))?;

        info!(
            event = "table_committed",
            table = %table.name,
            inserted = outcome.inserted,
            skipped = request.rows.len() as u64 - outcome.inserted,
            "table committed"
        );
        Ok(outcome)
    }
}

/// Truncate `tables` with CASCADE in one transaction.
pub async fn truncate_tables(conn: &mut PgConnection, tables: &[String]) -> Result<(), SeedError> {
    if tables.is_empty() {
        return Ok(());
    }
    let list = tables
        .iter()
        .map(|table| quote_ident(table))
        .collect::<Vec<_>>()
        .join(", ");
    let scope = tables.join(",");

    let statement = format!("TRUNCATE TABLE {list} CASCADE");

    let mut tx = conn.begin().await.map_err(|err| classify(&scope, err))?;
    sqlx::query(&statement)
        .execute(&mut *tx)
        .await
        .map_err(|err| classify(&scope, err))?;
    tx.commit().await.map_err(|err| classify(&scope, err))?;

    info!(event = "tables_truncated", tables = tables.len(), "tables truncated");
    Ok(())
}

/// Rows per statement when each row binds `columns` parameters.
pub fn rows_per_statement(columns: usize, page_rows: usize) -> usize {
    match columns {
        0 => 1,
        n => (MAX_BIND_PARAMS / n).clamp(1, page_rows.max(1)),
    }
}

fn insert_statement(
    table: &Table,
    insert_columns: &[usize],
    page: &[Vec<SeedValue>],
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO {}", quote_ident(&table.name)));

    if insert_columns.is_empty() {
        // One row per statement when nothing is bound.
        builder.push(" DEFAULT VALUES");
    } else {
        builder.push(" (");
        let mut names = builder.separated(", ");
        for idx in insert_columns {
            names.push(quote_ident(&table.columns[*idx].name));
        }
        builder.push(") ");
        builder.push_values(page, |mut values, row| {
            for idx in insert_columns {
                push_value(&mut values, &table.columns[*idx], &row[*idx]);
            }
        });
    }

    builder.push(" ON CONFLICT DO NOTHING");
    builder
}

fn push_returning(builder: &mut QueryBuilder<'_, Postgres>, table: &Table, tracked: &[usize]) {
    builder.push(" RETURNING ");
    let mut returning = builder.separated(", ");
    for idx in tracked {
        let column = &table.columns[*idx];
        let name = quote_ident(&column.name);
        match column.kind {
            ColumnKind::Enumeration { .. } => returning.push(format!("{name}::text")),
            _ => returning.push(name),
        };
    }
}

fn push_value(
    values: &mut Separated<'_, '_, Postgres, &'static str>,
    column: &Column,
    value: &SeedValue,
) {
    match &column.kind {
        ColumnKind::Integer {
            width: IntWidth::Small,
        } => {
            values.push_bind(value.as_i64().and_then(|v| i16::try_from(v).ok()));
        }
        ColumnKind::Integer {
            width: IntWidth::Regular,
        } => {
            values.push_bind(value.as_i64().and_then(|v| i32::try_from(v).ok()));
        }
        ColumnKind::Integer { width: IntWidth::Big } => {
            values.push_bind(value.as_i64());
        }
        ColumnKind::Boolean => {
            values.push_bind(value.as_bool());
        }
        ColumnKind::Uuid => {
            values.push_bind(value.as_uuid());
        }
        ColumnKind::Timestamp {
            with_time_zone: true,
        } => {
            values.push_bind(value.as_timestamp().map(|ts| ts.and_utc()));
        }
        ColumnKind::Timestamp {
            with_time_zone: false,
        } => {
            values.push_bind(value.as_timestamp());
        }
        ColumnKind::Enumeration { enum_type } => {
            values
                .push_bind(value.as_text())
                .push_unseparated(format!("::{}", enum_type.qualified_name()));
        }
        ColumnKind::Text | ColumnKind::Unsupported => {
            values.push_bind(value.as_text());
        }
    }
}

fn decode_tracked(
    table: &Table,
    tracked: &[usize],
    row: &PgRow,
) -> Result<Vec<SeedValue>, sqlx::Error> {
    let mut values = Vec::with_capacity(tracked.len());
    for (position, idx) in tracked.iter().enumerate() {
        let value = match table.columns[*idx].kind {
            ColumnKind::Integer {
                width: IntWidth::Small,
            } => row
                .try_get::<Option<i16>, _>(position)?
                .map(|v| SeedValue::Int(v.into())),
            ColumnKind::Integer {
                width: IntWidth::Regular,
            } => row
                .try_get::<Option<i32>, _>(position)?
                .map(|v| SeedValue::Int(v.into())),
            ColumnKind::Integer { width: IntWidth::Big } => {
                row.try_get::<Option<i64>, _>(position)?.map(SeedValue::Int)
            }
            ColumnKind::Boolean => row.try_get::<Option<bool>, _>(position)?.map(SeedValue::Bool),
            ColumnKind::Uuid => row.try_get::<Option<Uuid>, _>(position)?.map(SeedValue::Uuid),
            ColumnKind::Timestamp {
                with_time_zone: true,
            } => row
                .try_get::<Option<DateTime<Utc>>, _>(position)?
                .map(|ts| SeedValue::Timestamp(ts.naive_utc())),
            ColumnKind::Timestamp {
                with_time_zone: false,
            } => row
                .try_get::<Option<NaiveDateTime>, _>(position)?
                .map(SeedValue::Timestamp),
            ColumnKind::Text | ColumnKind::Enumeration { .. } | ColumnKind::Unsupported => {
                row.try_get::<Option<String>, _>(position)?.map(SeedValue::Text)
            }
        };
        values.push(value.unwrap_or(SeedValue::Null));
    }
    Ok(values)
}

/// Map a sqlx failure onto the seeding error taxonomy.
pub fn classify(table: &str, err: sqlx::Error) -> SeedError {
    let table = table.to_string();
    if let sqlx::Error::Database(db) = &err {
        let kind = match db.kind() {
            ErrorKind::UniqueViolation => Some("unique"),
            ErrorKind::ForeignKeyViolation => Some("foreign key"),
            ErrorKind::NotNullViolation => Some("not null"),
            ErrorKind::CheckViolation => Some("check"),
            _ => None,
        };
        if let Some(kind) = kind {
            return SeedError::ConstraintViolation {
                table,
                kind: kind.to_string(),
                message: db.message().to_string(),
            };
        }
    }

    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => SeedError::Connectivity { table, source: err },
        other => SeedError::Database {
            table,
            source: other,
        },
    }
}
