use std::{env, fs};

use anyhow::{Context, Result, anyhow};
use bloatdb_core::{DatabaseSchema, validate_schema};
use bloatdb_generate::{
    BatchWriter, CsvWriter, PgBatchWriter, SeedEngine, SeedError, SeedOptions, SeedReport,
    SeedValue, WriteRequest, import_csv_dir, truncate_tables,
};
use bloatdb_introspect::{IntrospectOptions, introspect_postgres};
use bloatdb_plan::{InsertionPlan, resolve_schema};
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};

const FIXTURE: &str = "tests/fixtures/seed.sql";
const FIXTURE_NAMESPACE: &str = "bloatdb_seed_it";

fn database_url() -> Result<String> {
    env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .context("set TEST_DATABASE_URL or DATABASE_URL for integration tests")
}

/// Connect with `search_path` pinned to a fresh copy of the fixture schema.
async fn fixture(namespace: &str) -> Result<(PgConnection, DatabaseSchema)> {
    let options: PgConnectOptions = database_url()?.parse().context("parsing database url")?;
    let options = options.options([("search_path", namespace)]);
    let mut conn = PgConnection::connect_with(&options)
        .await
        .context("connecting to Postgres")?;

    let script = fs::read_to_string(FIXTURE).with_context(|| format!("reading {FIXTURE}"))?;
    let script = script.replace(FIXTURE_NAMESPACE, namespace);
    for statement in script.split(';') {
        let sql = statement.trim();
        if sql.is_empty() {
            continue;
        }
        sqlx::query(sql)
            .execute(&mut conn)
            .await
            .with_context(|| format!("executing fixture statement: {sql}"))?;
    }

    let description = introspect_postgres(&mut conn, &IntrospectOptions::for_namespace(namespace))
        .await
        .context("introspecting")?;
    let schema = DatabaseSchema::from_description(&description, None)?;
    validate_schema(&schema)?;
    Ok((conn, schema))
}

fn options() -> SeedOptions {
    let mut options = SeedOptions {
        rows_per_table: 25,
        seed: Some(7),
        page_rows: 7,
        ..SeedOptions::default()
    };
    options.table_rows.insert("codes".to_string(), 200);
    options
}

async fn count(conn: &mut PgConnection, sql: &str) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("running {sql}"))
}

fn inserted(report: &SeedReport, table: &str) -> Result<i64> {
    let rows = report
        .table(table)
        .map(|t| t.rows_inserted)
        .ok_or_else(|| anyhow!("{table} missing from report"))?;
    Ok(i64::try_from(rows)?)
}

#[tokio::test]
#[ignore = "requires a Postgres instance"]
async fn seeds_every_table_with_valid_references() -> Result<()> {
    let (mut conn, schema) = fixture("bloatdb_seed_it_full").await?;
    let resolution = resolve_schema(&schema).context("resolve order")?;
    assert!(resolution.excluded.is_empty());
    let plan = resolution.plan.tables();
    let users_at = plan.iter().position(|t| t == "users");
    let posts_at = plan.iter().position(|t| t == "posts");
    assert!(users_at < posts_at, "users must precede posts in {plan:?}");

    let engine = SeedEngine::new(options());
    let mut writer = PgBatchWriter::new(&mut conn, engine.options().page_rows);
    let report = engine
        .run(&schema, &resolution.plan, &resolution.excluded, &mut writer)
        .await
        .context("seed run")?;

    assert_eq!(count(&mut conn, "select count(*) from users").await?, inserted(&report, "users")?);
    assert_eq!(count(&mut conn, "select count(*) from posts").await?, inserted(&report, "posts")?);
    assert!(inserted(&report, "posts")? > 0);

    let dangling = count(
        &mut conn,
        "select count(*) from posts p left join users u on u.id = p.user_id where u.id is null",
    )
    .await?;
    assert_eq!(dangling, 0);

    let future = count(&mut conn, "select count(*) from posts where published_at > now()").await?;
    assert_eq!(future, 0);
    let statuses = count(&mut conn, "select count(distinct status) from users").await?;
    assert!(statuses >= 1);

    let codes = report.table("codes").ok_or_else(|| anyhow!("codes missing"))?;
    assert_eq!(codes.rows_requested, 200);
    assert!(codes.rows_inserted <= 62, "one-character keys: {codes:?}");
    assert!(codes.rows_skipped > 0);
    assert_eq!(codes.rows_inserted + codes.rows_skipped, 200);
    assert_eq!(count(&mut conn, "select count(*) from codes").await?, inserted(&report, "codes")?);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Postgres instance"]
async fn failing_page_rolls_back_the_whole_table() -> Result<()> {
    let namespace = "bloatdb_seed_it_rollback";
    let (mut conn, _) = fixture(namespace).await?;
    sqlx::query(&format!(
        "create table {namespace}.scores (id integer primary key, points integer not null check (points < 0))"
    ))
    .execute(&mut conn)
    .await?;
    let description = introspect_postgres(&mut conn, &IntrospectOptions::for_namespace(namespace))
        .await?;
    let schema = DatabaseSchema::from_description(&description, None)?;
    let scores = schema.table("scores").ok_or_else(|| anyhow!("scores missing"))?;

    let rows = vec![
        vec![SeedValue::Int(1), SeedValue::Int(-1)],
        vec![SeedValue::Int(2), SeedValue::Int(-2)],
        vec![SeedValue::Int(3), SeedValue::Int(7)],
    ];
    let mut writer = PgBatchWriter::new(&mut conn, 1);
    let err = writer
        .write(WriteRequest {
            table: scores,
            position: 1,
            rows: &rows,
            tracked: &[],
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SeedError::ConstraintViolation { ref table, ref kind, .. } if table == "scores" && kind == "check"
    ));

    assert_eq!(count(&mut conn, "select count(*) from scores").await?, 0);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Postgres instance"]
async fn truncate_cascades_to_referencing_tables() -> Result<()> {
    let (mut conn, schema) = fixture("bloatdb_seed_it_truncate").await?;
    let plan = InsertionPlan::new(vec!["users".to_string(), "posts".to_string()]);

    let engine = SeedEngine::new(options());
    let mut writer = PgBatchWriter::new(&mut conn, engine.options().page_rows);
    engine.run(&schema, &plan, &[], &mut writer).await?;
    assert!(count(&mut conn, "select count(*) from posts").await? > 0);

    truncate_tables(&mut conn, &["users".to_string()]).await?;
    assert_eq!(count(&mut conn, "select count(*) from users").await?, 0);
    assert_eq!(count(&mut conn, "select count(*) from posts").await?, 0);
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Postgres instance"]
async fn csv_export_imports_back_with_copy() -> Result<()> {
    let (mut conn, schema) = fixture("bloatdb_seed_it_import").await?;
    let resolution = resolve_schema(&schema).context("resolve order")?;

    let dir = env::temp_dir().join(format!("bloatdb_seed_it_{}", uuid::Uuid::new_v4()));
    let mut writer = CsvWriter::new(&dir)?;
    let report = SeedEngine::new(options())
        .run(&schema, &resolution.plan, &resolution.excluded, &mut writer)
        .await
        .context("csv export")?;

    let imported = import_csv_dir(&mut conn, &schema, &resolution.plan, &dir)
        .await
        .context("import")?;
    assert_eq!(imported.tables.len(), resolution.plan.len());
    assert_eq!(imported.total_rows(), report.total_inserted());

    for table in ["users", "posts", "codes"] {
        let rows = count(&mut conn, &format!("select count(*) from {table}")).await?;
        assert_eq!(rows, inserted(&report, table)?, "{table}");
    }
    let dangling = count(
        &mut conn,
        "select count(*) from posts p left join users u on u.id = p.user_id where u.id is null",
    )
    .await?;
    assert_eq!(dangling, 0);
    let nicknames = count(&mut conn, "select count(*) from users where nickname is not null").await?;
    assert_eq!(nicknames, 0);

    let err = import_csv_dir(&mut conn, &schema, &resolution.plan, &dir)
        .await
        .unwrap_err();
    assert!(matches!(err, SeedError::ConstraintViolation { ref kind, .. } if kind == "unique"));

    fs::remove_dir_all(&dir).ok();
    Ok(())
}
