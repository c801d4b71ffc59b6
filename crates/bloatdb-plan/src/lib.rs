//! Insertion-order resolution for bloatdb.
//!
//! Turns the foreign-key graph of a [`bloatdb_core::DatabaseSchema`] into a
//! safe processing order, excluding tables that sit on or reach a cycle, and
//! validates cached plans against a live schema.

pub mod errors;
pub mod graph;
pub mod model;
pub mod resolve;
pub mod schema;
pub mod validate;

pub use errors::{IssueSeverity, PlanError, Result, ValidationIssue, ValidationReport};
pub use graph::DependencyGraph;
pub use model::{InsertionPlan, OrderedPlan, Resolution};
pub use resolve::{MAX_TRAIL_DEPTH, resolve, resolve_graph, resolve_schema};
pub use schema::plan_json_schema;
pub use validate::{ValidatedPlan, validate_plan, validate_plan_against_schema, validate_plan_json};
