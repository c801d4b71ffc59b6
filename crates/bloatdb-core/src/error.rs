use thiserror::Error;

/// Errors raised while describing, loading or checking a schema.
#[derive(Debug, Error)]
pub enum Error {
    /// An introspection query failed or the connection dropped.
    #[error("database error: {0}")]
    Db(String),
    /// Dangling foreign key, duplicate name, or an enum with no labels.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Constraint or type the description format cannot carry.
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
