//! Database introspection adapters.

pub mod adapter;
pub mod options;
pub mod postgres;

pub use adapter::Adapter;
pub use options::IntrospectOptions;
pub use postgres::{PostgresAdapter, database_name, introspect_postgres, list_base_tables};

pub use bloatdb_core::SchemaDescription;
