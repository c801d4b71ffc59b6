use std::path::{Path, PathBuf};

use bloatdb_core::{DEFAULT_NAMESPACE, DatabaseSchema, validate_schema};
use bloatdb_generate::{
    CsvWriter, ImportReport, MemoryWriter, PgBatchWriter, SeedEngine, SeedReport,
    import_csv_dir, truncate_tables,
};
use bloatdb_introspect::{IntrospectOptions, database_name, introspect_postgres, list_base_tables};
use bloatdb_plan::{OrderedPlan, plan_json_schema, resolve_schema, validate_plan};
use chrono::{Local, NaiveDate};
use sqlx::{Connection, PgConnection};
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::CliError;
use crate::workspace::CacheLayout;

/// Where generated rows go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    Database,
    DryRun,
    Csv(PathBuf),
}

#[derive(Debug, Clone)]
pub struct SeedRequest {
    pub rows: Option<u64>,
    pub seed: Option<u64>,
    pub page_rows: Option<usize>,
    pub truncate: bool,
    pub sink: Sink,
    pub rebuild: bool,
}

/// One connection plus the caches for the database behind it.
pub struct Session {
    config: Config,
    cache: CacheLayout,
    namespace: String,
    database: String,
    day: NaiveDate,
    conn: PgConnection,
}

impl Session {
    pub async fn open(
        config: Config,
        flag_url: Option<&str>,
        namespace: String,
    ) -> Result<Self, CliError> {
        let env_url = std::env::var("DATABASE_URL").ok();
        let options = config
            .connect_options(flag_url, env_url.as_deref())?
            .options([("search_path", namespace.as_str())]);
        let mut conn = PgConnection::connect_with(&options).await?;
        let database = database_name(&mut conn).await?;
        let cache = CacheLayout::new(config.cache.dir.clone());
        info!(
            event = "connected",
            database = %database,
            namespace = %namespace,
            cache_dir = %cache.root().display(),
            "connected"
        );

        Ok(Self {
            cache,
            config,
            namespace,
            database,
            day: Local::now().date_naive(),
            conn,
        })
    }

    fn cache_key(&self) -> String {
        cache_key(&self.database, &self.namespace)
    }

    /// Cached description for today, or a fresh introspection.
    pub async fn load_schema(&mut self, rebuild: bool) -> Result<DatabaseSchema, CliError> {
        let key = self.cache_key();
        let cached = if rebuild {
            None
        } else {
            self.cache.load_schema(&key, self.day)?
        };

        let description = match cached {
            Some(description) => {
                info!(event = "schema_cache_hit", database = %self.database, "using cached schema");
                description
            }
            None => {
                let options = IntrospectOptions::for_namespace(self.namespace.clone());
                let description = introspect_postgres(&mut self.conn, &options).await?;
                let path = self.cache.store_schema(&key, self.day, &description)?;
                info!(
                    event = "schema_introspected",
                    tables = description.tables.len(),
                    path = %path.display(),
                    "schema cached"
                );
                description
            }
        };

        let schema = DatabaseSchema::from_description(&description, Some(self.database.clone()))?;
        validate_schema(&schema)?;
        Ok(schema)
    }

    /// Cached plan if it still fits `schema`, otherwise a fresh resolution.
    pub fn load_plan(
        &self,
        schema: &DatabaseSchema,
        rebuild: bool,
    ) -> Result<OrderedPlan, CliError> {
        let key = self.cache_key();
        if !rebuild && let Some(raw) = self.cache.load_plan(&key, self.day)? {
            let plan_schema = serde_json::to_value(plan_json_schema())?;
            match validate_plan(&raw, &plan_schema, schema) {
                Ok(validated) => {
                    for issue in &validated.warnings {
                        warn!(event = "plan_cache_warning", issue = %issue, "cached plan warning");
                    }
                    info!(event = "plan_cache_hit", tables = validated.plan.order.len(), "using cached plan");
                    return Ok(validated.plan);
                }
                Err(report) => {
                    for issue in &report.errors {
                        warn!(event = "plan_cache_rejected", issue = %issue, "cached plan is stale");
                    }
                }
            }
        }

        let resolution = resolve_schema(schema)?;
        let plan = OrderedPlan::from_resolution(&resolution, schema)?;
        let path = self.cache.store_plan(&key, self.day, &plan)?;
        info!(
            event = "plan_built",
            tables = plan.order.len(),
            excluded = plan.excluded.len(),
            path = %path.display(),
            "plan cached"
        );
        Ok(plan)
    }

    pub async fn truncate(&mut self) -> Result<Vec<String>, CliError> {
        let tables = list_base_tables(&mut self.conn, &self.namespace).await?;
        truncate_tables(&mut self.conn, &tables).await?;
        Ok(tables)
    }

    pub async fn seed(&mut self, request: SeedRequest) -> Result<SeedReport, CliError> {
        let mut options = self.config.seed.to_options();
        if let Some(rows) = request.rows {
            options.rows_per_table = rows;
        }
        if request.seed.is_some() {
            options.seed = request.seed;
        }
        if let Some(page_rows) = request.page_rows {
            options.page_rows = page_rows;
        }

        let schema = self.load_schema(request.rebuild).await?;
        let plan = self.load_plan(&schema, request.rebuild)?;
        let insertion = plan.insertion_plan();
        let engine = SeedEngine::new(options);

        let report = match request.sink {
            Sink::DryRun => {
                let mut writer = MemoryWriter::new();
                engine
                    .run(&schema, &insertion, &plan.excluded, &mut writer)
                    .await?
            }
            Sink::Csv(dir) => {
                let mut writer = CsvWriter::new(dir)?;
                let report = engine
                    .run(&schema, &insertion, &plan.excluded, &mut writer)
                    .await?;
                info!(event = "csv_exported", dir = %writer.dir().display(), "csv export written");
                report
            }
            Sink::Database => {
                if request.truncate {
                    let tables = self.truncate().await?;
                    info!(event = "pre_seed_truncate", tables = tables.len(), "namespace truncated");
                }
                let page_rows = engine.options().page_rows;
                let mut writer = PgBatchWriter::new(&mut self.conn, page_rows);
                engine
                    .run(&schema, &insertion, &plan.excluded, &mut writer)
                    .await?
            }
        };
        Ok(report)
    }

    /// Load a CSV export directory into the database in insertion order.
    pub async fn import(
        &mut self,
        dir: &Path,
        truncate: bool,
        rebuild: bool,
    ) -> Result<ImportReport, CliError> {
        let schema = self.load_schema(rebuild).await?;
        let plan = self.load_plan(&schema, rebuild)?;
        if truncate {
            let tables = self.truncate().await?;
            info!(event = "pre_import_truncate", tables = tables.len(), "namespace truncated");
        }
        let report = import_csv_dir(&mut self.conn, &schema, &plan.insertion_plan(), dir).await?;
        Ok(report)
    }
}

/// Non-default namespaces get their own cache entries.
pub fn cache_key(database: &str, namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        database.to_string()
    } else {
        format!("{database}_{namespace}")
    }
}

pub fn schema_summary(schema: &DatabaseSchema) -> Vec<String> {
    let with_fks = schema.tables.iter().filter(|t| t.has_foreign_keys()).count();
    let mut lines = vec![
        format!("database: {}", schema.database.as_deref().unwrap_or("-")),
        format!("tables: {} ({} with foreign keys)", schema.tables.len(), with_fks),
    ];
    for table in &schema.tables {
        let mut line = format!("  {}: {} columns", table.name, table.columns.len());
        let referenced = table.referenced_tables();
        if !referenced.is_empty() {
            line.push_str(&format!(" -> {}", referenced.join(", ")));
        }
        lines.push(line);
    }
    lines
}

pub fn order_lines(plan: &OrderedPlan) -> Vec<String> {
    let mut lines = plan.display_lines();
    if !plan.excluded.is_empty() {
        lines.push(format!(
            "excluded (circular foreign keys): {}",
            plan.excluded.join(", ")
        ));
    }
    lines
}

pub fn report_lines(report: &SeedReport) -> Vec<String> {
    let mut lines = vec![format!("seed: {}", report.seed)];
    for table in &report.tables {
        lines.push(format!(
            "{} - {}: {} inserted, {} skipped",
            table.position, table.table, table.rows_inserted, table.rows_skipped
        ));
    }
    if !report.excluded.is_empty() {
        lines.push(format!(
            "excluded (circular foreign keys): {}",
            report.excluded.join(", ")
        ));
    }
    lines.push(format!("total: {} rows", report.total_inserted()));
    lines
}

pub fn import_lines(report: &ImportReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .tables
        .iter()
        .map(|table| {
            format!(
                "{} - {}: {} rows from {}",
                table.position,
                table.table,
                table.rows,
                table.path.display()
            )
        })
        .collect();
    lines.push(format!("total: {} rows", report.total_rows()));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloatdb_core::SchemaDescription;
    use bloatdb_generate::{ImportedTable, TableReport};

    fn schema() -> DatabaseSchema {
        let description: SchemaDescription = serde_json::from_value(serde_json::json!({
            "users": {"columns": [
                {"name": "id", "data_type": "uuid", "is_nullable": false,
                 "constraint": {"type": "PRIMARY KEY"}}
            ]},
            "posts": {"columns": [
                {"name": "id", "data_type": "integer", "is_nullable": false,
                 "constraint": {"type": "PRIMARY KEY"}},
                {"name": "user_id", "data_type": "uuid", "is_nullable": false,
                 "constraint": {"type": "FOREIGN KEY", "referenced_table": "users", "referenced_column": "id"}}
            ]},
            "nodes": {"columns": [
                {"name": "parent_id", "data_type": "integer", "is_nullable": true,
                 "constraint": {"type": "FOREIGN KEY", "referenced_table": "nodes", "referenced_column": "parent_id"}}
            ]}
        }))
        .expect("description");
        DatabaseSchema::from_description(&description, Some("blog".to_string())).expect("schema")
    }

    #[test]
    fn cache_keys_separate_namespaces() {
        assert_eq!(cache_key("shop", DEFAULT_NAMESPACE), "shop");
        assert_eq!(cache_key("shop", "audit"), "shop_audit");
    }

    #[test]
    fn summary_lists_tables_and_references() {
        let lines = schema_summary(&schema());
        assert_eq!(lines[0], "database: blog");
        assert_eq!(lines[1], "tables: 3 (2 with foreign keys)");
        assert!(lines.contains(&"  posts: 2 columns -> users".to_string()));
        assert!(lines.contains(&"  users: 1 columns".to_string()));
    }

    #[test]
    fn order_lines_number_tables_then_list_exclusions() {
        let schema = schema();
        let resolution = resolve_schema(&schema).expect("resolve");
        let plan = OrderedPlan::from_resolution(&resolution, &schema).expect("plan");

        assert_eq!(
            order_lines(&plan),
            vec![
                "1 - users".to_string(),
                "2 - posts".to_string(),
                "excluded (circular foreign keys): nodes".to_string(),
            ]
        );
    }

    #[test]
    fn report_lines_include_totals() {
        let report = SeedReport {
            seed: 42,
            tables: vec![
                TableReport {
                    position: 1,
                    table: "users".to_string(),
                    rows_requested: 3,
                    rows_inserted: 3,
                    rows_skipped: 0,
                },
                TableReport {
                    position: 2,
                    table: "posts".to_string(),
                    rows_requested: 3,
                    rows_inserted: 2,
                    rows_skipped: 1,
                },
            ],
            excluded: Vec::new(),
        };

        assert_eq!(
            report_lines(&report),
            vec![
                "seed: 42",
                "1 - users: 3 inserted, 0 skipped",
                "2 - posts: 2 inserted, 1 skipped",
                "total: 5 rows",
            ]
        );
    }

    #[test]
    fn import_lines_name_each_file() {
        let report = ImportReport {
            tables: vec![
                ImportedTable {
                    position: 1,
                    table: "users".to_string(),
                    path: PathBuf::from("out/1_users.csv"),
                    rows: 3,
                },
                ImportedTable {
                    position: 2,
                    table: "posts".to_string(),
                    path: PathBuf::from("out/2_posts_20261017.csv"),
                    rows: 7,
                },
            ],
        };

        assert_eq!(
            import_lines(&report),
            vec![
                "1 - users: 3 rows from out/1_users.csv",
                "2 - posts: 7 rows from out/2_posts_20261017.csv",
                "total: 10 rows",
            ]
        );
    }
}
