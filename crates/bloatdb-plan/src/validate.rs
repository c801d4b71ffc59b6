use std::collections::{BTreeMap, BTreeSet};

use bloatdb_core::DatabaseSchema;
use jsonschema::JSONSchema;
use serde_json::Value;

use crate::errors::{PlanError, ValidationIssue, ValidationReport};
use crate::model::OrderedPlan;

/// Plan that passed every check, with its warnings.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: OrderedPlan,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a plan JSON document against the plan JSON Schema.
pub fn validate_plan_json(
    plan_json: &Value,
    plan_schema: &Value,
) -> Result<ValidationReport, PlanError> {
    let compiled =
        JSONSchema::compile(plan_schema).map_err(|err| PlanError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();
    if let Err(errors) = compiled.validate(plan_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push(ValidationIssue::error("schema_violation", path, error.to_string()));
        }
    }

    Ok(report)
}

/// Check that a cached plan is still a safe order for `schema`.
pub fn validate_plan_against_schema(plan: &OrderedPlan, schema: &DatabaseSchema) -> ValidationReport {
    let mut report = ValidationReport::default();

    validate_fingerprint(plan, schema, &mut report);
    let positions = validate_positions(plan, schema, &mut report);
    validate_edges(&positions, schema, &mut report);
    validate_coverage(plan, &positions, schema, &mut report);

    report
}

/// Structural check, parse, then schema check.
pub fn validate_plan(
    plan_json: &Value,
    plan_schema: &Value,
    schema: &DatabaseSchema,
) -> Result<ValidatedPlan, ValidationReport> {
    let structural = match validate_plan_json(plan_json, plan_schema) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error("schema_validation_error", "/", err.to_string()));
            return Err(report);
        }
    };
    if !structural.is_ok() {
        return Err(structural);
    }

    let plan: OrderedPlan = match serde_json::from_value(plan_json.clone()) {
        Ok(plan) => plan,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error("invalid_plan_json", "/", err.to_string()));
            return Err(report);
        }
    };

    let report = validate_plan_against_schema(&plan, schema);
    if !report.is_ok() {
        return Err(report);
    }

    Ok(ValidatedPlan {
        plan,
        warnings: report.warnings,
    })
}

fn validate_fingerprint(plan: &OrderedPlan, schema: &DatabaseSchema, report: &mut ValidationReport) {
    match (&plan.schema_fingerprint, &schema.fingerprint) {
        (Some(plan_fp), Some(schema_fp)) if plan_fp != schema_fp => {
            report.push(
                ValidationIssue::error(
                    "schema_fingerprint_mismatch",
                    "/schema_fingerprint",
                    "plan was built from a different schema",
                )
                .with_hint("rebuild the plan with --rebuild"),
            );
        }
        (None, Some(_)) => {
            report.push(ValidationIssue::warning(
                "schema_fingerprint_not_set",
                "/",
                "plan carries no schema fingerprint",
            ));
        }
        _ => {}
    }
}

/// Checks entry shape and table names; returns each planned table's position.
fn validate_positions(
    plan: &OrderedPlan,
    schema: &DatabaseSchema,
    report: &mut ValidationReport,
) -> BTreeMap<String, usize> {
    let excluded: BTreeSet<&str> = plan.excluded.iter().map(String::as_str).collect();
    let mut positions = BTreeMap::new();

    for (expected, (position, entry)) in (1..).zip(&plan.order) {
        let path = format!("/order/{position}");
        if *position != expected {
            report.push(ValidationIssue::error(
                "position_gap",
                &path,
                format!("expected position {expected}, found {position}"),
            ));
        }
        if entry.len() != 1 {
            report.push(ValidationIssue::error(
                "entry_shape",
                &path,
                format!("expected exactly one table, found {}", entry.len()),
            ));
        }

        for name in entry.keys() {
            let table_path = format!("{path}/{name}");
            if schema.table(name).is_none() {
                report.push(
                    ValidationIssue::error(
                        "table_not_found",
                        &table_path,
                        format!("table '{name}' is not in the schema"),
                    )
                    .with_hint("rebuild the plan with --rebuild"),
                );
                continue;
            }
            if excluded.contains(name.as_str()) {
                report.push(ValidationIssue::error(
                    "excluded_table_planned",
                    &table_path,
                    format!("table '{name}' is both planned and excluded"),
                ));
            }
            if positions.insert(name.clone(), *position).is_some() {
                report.push(ValidationIssue::error(
                    "duplicate_table",
                    &table_path,
                    format!("table '{name}' appears more than once"),
                ));
            }
        }
    }

    positions
}

fn validate_edges(
    positions: &BTreeMap<String, usize>,
    schema: &DatabaseSchema,
    report: &mut ValidationReport,
) {
    for table in &schema.tables {
        let Some(own) = positions.get(&table.name) else {
            continue;
        };
        for (column, fk) in table.foreign_keys() {
            let path = format!("/order/{own}/{}", table.name);
            if fk.table == table.name {
                report.push(ValidationIssue::error(
                    "self_reference_planned",
                    path,
                    format!("{}.{} references its own table", table.name, column.name),
                ));
                continue;
            }
            match positions.get(&fk.table) {
                Some(referenced) if referenced >= own => {
                    report.push(
                        ValidationIssue::error(
                            "order_violation",
                            path,
                            format!(
                                "{}.{} references '{}' which is planned at {referenced}",
                                table.name, column.name, fk.table
                            ),
                        )
                        .with_hint("referenced tables must be seeded first"),
                    );
                }
                None if schema.table(&fk.table).is_some() => {
                    report.push(ValidationIssue::error(
                        "unplanned_reference",
                        path,
                        format!(
                            "{}.{} references '{}' which is not planned",
                            table.name, column.name, fk.table
                        ),
                    ));
                }
                _ => {}
            }
        }
    }
}

fn validate_coverage(
    plan: &OrderedPlan,
    positions: &BTreeMap<String, usize>,
    schema: &DatabaseSchema,
    report: &mut ValidationReport,
) {
    for name in schema.table_names() {
        if !positions.contains_key(&name) && !plan.excluded.contains(&name) {
            report.push(ValidationIssue::warning(
                "table_not_planned",
                "/order",
                format!("table '{name}' is neither planned nor excluded"),
            ));
        }
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
