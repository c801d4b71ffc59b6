//! Core contracts for bloatdb.
//!
//! This crate defines the schema model consumed by the resolver and the
//! seeding engine, the JSON description format produced by introspection,
//! and the validation helpers shared across crates.

pub mod constraints;
pub mod description;
pub mod error;
pub mod schema;
pub mod types;
pub mod validation;

pub use constraints::{Constraint, ConstraintKind, ForeignKeyRef, KeyMembership};
pub use description::{
    ColumnDescription, ConstraintEntry, ConstraintField, DatabaseMetadata, SchemaDescription,
    TableDescription, TableMetadata, UserDefinedType,
};
pub use error::{Error, Result};
pub use schema::{Column, DatabaseSchema, Table, UniqueKey};
pub use types::{ColumnKind, EnumType, IntWidth};
pub use validation::validate_schema;

/// Namespace introspected when none is configured.
pub const DEFAULT_NAMESPACE: &str = "public";
