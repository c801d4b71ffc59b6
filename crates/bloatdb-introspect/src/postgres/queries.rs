use sqlx::{FromRow, PgConnection};

use bloatdb_core::{Error, Result};

fn db_error(err: sqlx::Error) -> Error {
    Error::Db(err.to_string())
}

pub async fn fetch_database_name(conn: &mut PgConnection) -> Result<String> {
    sqlx::query_scalar::<_, String>("select current_database()::text")
        .fetch_one(conn)
        .await
        .map_err(db_error)
}

pub async fn list_tables(conn: &mut PgConnection, namespace: &str) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select table_name::text
        from information_schema.tables
        where table_schema = $1
          and table_type = 'BASE TABLE'
        order by table_name
        "#,
    )
    .bind(namespace)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

#[derive(Debug, Clone, FromRow)]
pub struct RawColumn {
    pub name: String,
    pub data_type: String,
    pub column_default: Option<String>,
    pub is_nullable: bool,
    pub character_maximum_length: Option<i32>,
    pub udt_schema: String,
    pub udt_name: String,
}

pub async fn list_columns(
    conn: &mut PgConnection,
    namespace: &str,
    table: &str,
) -> Result<Vec<RawColumn>> {
    sqlx::query_as::<_, RawColumn>(
        r#"
        select
          column_name::text as name,
          data_type::text as data_type,
          column_default::text as column_default,
          (is_nullable = 'YES') as is_nullable,
          character_maximum_length::int4 as character_maximum_length,
          udt_schema::text as udt_schema,
          udt_name::text as udt_name
        from information_schema.columns
        where table_schema = $1
          and table_name = $2
        order by ordinal_position
        "#,
    )
    .bind(namespace)
    .bind(table)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

#[derive(Debug, Clone, FromRow)]
pub struct RawConstraint {
    pub column_name: String,
    pub constraint_name: String,
    pub constraint_type: String,
    pub referenced_table: Option<String>,
    pub referenced_column: Option<String>,
}

/// Column-level constraints of one table. Key constraints come from
/// `key_column_usage`; checks only appear in `constraint_column_usage`.
///
/// FK columns are paired with their referenced column by position in the
/// referenced unique constraint, so composite keys map column to column.
pub async fn list_constraints(
    conn: &mut PgConnection,
    namespace: &str,
    table: &str,
) -> Result<Vec<RawConstraint>> {
    sqlx::query_as::<_, RawConstraint>(
        r#"
        select
          kcu.column_name::text as column_name,
          tc.constraint_name::text as constraint_name,
          tc.constraint_type::text as constraint_type,
          rkcu.table_name::text as referenced_table,
          rkcu.column_name::text as referenced_column
        from information_schema.table_constraints tc
        join information_schema.key_column_usage kcu
          on kcu.constraint_schema = tc.constraint_schema
         and kcu.constraint_name = tc.constraint_name
         and kcu.table_schema = tc.table_schema
         and kcu.table_name = tc.table_name
        left join information_schema.referential_constraints rc
          on rc.constraint_schema = tc.constraint_schema
         and rc.constraint_name = tc.constraint_name
        left join information_schema.key_column_usage rkcu
          on rkcu.constraint_schema = rc.unique_constraint_schema
         and rkcu.constraint_name = rc.unique_constraint_name
         and rkcu.ordinal_position = kcu.position_in_unique_constraint
        where tc.table_schema = $1
          and tc.table_name = $2
          and tc.constraint_type in ('PRIMARY KEY', 'FOREIGN KEY', 'UNIQUE')
        union all
        select
          ccu.column_name::text,
          tc.constraint_name::text,
          tc.constraint_type::text,
          null,
          null
        from information_schema.table_constraints tc
        join information_schema.constraint_column_usage ccu
          on ccu.constraint_schema = tc.constraint_schema
         and ccu.constraint_name = tc.constraint_name
        where tc.table_schema = $1
          and tc.table_name = $2
          and tc.constraint_type = 'CHECK'
        order by 1, 2
        "#,
    )
    .bind(namespace)
    .bind(table)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}

pub async fn list_enum_labels(
    conn: &mut PgConnection,
    type_schema: &str,
    type_name: &str,
) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select e.enumlabel::text
        from pg_type t
        join pg_namespace n on n.oid = t.typnamespace
        join pg_enum e on e.enumtypid = t.oid
        where n.nspname = $1
          and t.typname = $2
        order by e.enumsortorder
        "#,
    )
    .bind(type_schema)
    .bind(type_name)
    .fetch_all(conn)
    .await
    .map_err(db_error)
}
