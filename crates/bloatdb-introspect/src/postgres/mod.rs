use std::collections::BTreeMap;

use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use bloatdb_core::{Error, Result, SchemaDescription};

use crate::adapter::Adapter;
use crate::options::IntrospectOptions;

mod mapper;
mod queries;

/// Adapter for PostgreSQL databases.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Adapter for PostgresAdapter {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn introspect(&self, opts: &IntrospectOptions) -> Result<SchemaDescription> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| Error::Db(err.to_string()))?;
        introspect_postgres(&mut conn, opts).await
    }
}

/// Current database name.
pub async fn database_name(conn: &mut PgConnection) -> Result<String> {
    queries::fetch_database_name(conn).await
}

/// Base tables of `namespace`, sorted by name.
pub async fn list_base_tables(conn: &mut PgConnection, namespace: &str) -> Result<Vec<String>> {
    queries::list_tables(conn, namespace).await
}

/// Describe every base table of the configured namespace.
pub async fn introspect_postgres(
    conn: &mut PgConnection,
    opts: &IntrospectOptions,
) -> Result<SchemaDescription> {
    let tables = queries::list_tables(conn, &opts.namespace).await?;
    info!(
        event = "introspection_started",
        namespace = %opts.namespace,
        tables = tables.len(),
        "describing tables"
    );

    let mut enum_labels: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    let mut description = SchemaDescription::default();

    for table in tables {
        let columns = queries::list_columns(conn, &opts.namespace, &table).await?;
        let raw_constraints = queries::list_constraints(conn, &opts.namespace, &table).await?;
        let constraints = mapper::group_constraints(raw_constraints)?;

        if opts.include_enum_labels {
            for column in columns.iter().filter(|c| c.data_type == mapper::USER_DEFINED) {
                let key = (column.udt_schema.clone(), column.udt_name.clone());
                if enum_labels.contains_key(&key) {
                    continue;
                }
                let labels = queries::list_enum_labels(conn, &key.0, &key.1).await?;
                enum_labels.insert(key, labels);
            }
        }

        let mapped = mapper::map_table(columns, constraints, &enum_labels);
        debug!(
            event = "table_described",
            table = %table,
            columns = mapped.table_metadata.column_count,
            has_foreign_keys = mapped.table_metadata.has_foreign_keys,
            "table described"
        );
        description.tables.insert(table, mapped);
    }

    description.refresh_metadata();
    Ok(description)
}
