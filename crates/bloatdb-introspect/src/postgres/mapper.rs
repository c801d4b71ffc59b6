use std::collections::BTreeMap;

use bloatdb_core::{
    ColumnDescription, ConstraintEntry, ConstraintField, ConstraintKind, Error, Result,
    TableDescription, TableMetadata, UserDefinedType,
};

use super::queries::{RawColumn, RawConstraint};

pub const USER_DEFINED: &str = "USER-DEFINED";

pub fn constraint_kind(raw: &str) -> Option<ConstraintKind> {
    match raw {
        "PRIMARY KEY" => Some(ConstraintKind::PrimaryKey),
        "FOREIGN KEY" => Some(ConstraintKind::ForeignKey),
        "UNIQUE" => Some(ConstraintKind::Unique),
        "CHECK" => Some(ConstraintKind::Check),
        _ => None,
    }
}

/// Group constraint rows by column, keyed by constraint name.
pub fn group_constraints(
    raw: Vec<RawConstraint>,
) -> Result<BTreeMap<String, BTreeMap<String, ConstraintEntry>>> {
    let mut grouped: BTreeMap<String, BTreeMap<String, ConstraintEntry>> = BTreeMap::new();
    for row in raw {
        let kind = constraint_kind(&row.constraint_type).ok_or_else(|| {
            Error::Unsupported(format!(
                "constraint type '{}' on {}",
                row.constraint_type, row.constraint_name
            ))
        })?;
        // One row per (column, constraint); a repeat keeps the first entry.
        grouped
            .entry(row.column_name)
            .or_default()
            .entry(row.constraint_name)
            .or_insert(ConstraintEntry {
                kind,
                referenced_table: row.referenced_table,
                referenced_column: row.referenced_column,
            });
    }
    Ok(grouped)
}

/// Build a table description. `enum_labels` is keyed by `(udt_schema, udt_name)`.
pub fn map_table(
    columns: Vec<RawColumn>,
    mut constraints: BTreeMap<String, BTreeMap<String, ConstraintEntry>>,
    enum_labels: &BTreeMap<(String, String), Vec<String>>,
) -> TableDescription {
    let columns: Vec<ColumnDescription> = columns
        .into_iter()
        .map(|column| {
            let user_defined_type = (column.data_type == USER_DEFINED).then(|| {
                let key = (column.udt_schema.clone(), column.udt_name.clone());
                UserDefinedType {
                    name: column.udt_name.clone(),
                    schema: Some(column.udt_schema.clone()),
                    values: enum_labels.get(&key).cloned().unwrap_or_default(),
                }
            });
            let constraint = constraints
                .remove(&column.name)
                .filter(|entries| !entries.is_empty())
                .map(ConstraintField::Named);

            ColumnDescription {
                name: column.name,
                data_type: column.data_type,
                column_default: column.column_default,
                is_nullable: column.is_nullable,
                character_maximum_length: column.character_maximum_length,
                constraint,
                user_defined_type,
            }
        })
        .collect();

    TableDescription {
        table_metadata: TableMetadata::from_columns(&columns),
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_column(name: &str, data_type: &str, udt_name: &str) -> RawColumn {
        RawColumn {
            name: name.to_string(),
            data_type: data_type.to_string(),
            column_default: None,
            is_nullable: false,
            character_maximum_length: None,
            udt_schema: "public".to_string(),
            udt_name: udt_name.to_string(),
        }
    }

    fn raw_constraint(
        column: &str,
        name: &str,
        kind: &str,
        target: Option<(&str, &str)>,
    ) -> RawConstraint {
        RawConstraint {
            column_name: column.to_string(),
            constraint_name: name.to_string(),
            constraint_type: kind.to_string(),
            referenced_table: target.map(|(table, _)| table.to_string()),
            referenced_column: target.map(|(_, column)| column.to_string()),
        }
    }

    #[test]
    fn maps_columns_constraints_and_enums() {
        let constraints = group_constraints(vec![
            raw_constraint("id", "posts_pkey", "PRIMARY KEY", Some(("posts", "id"))),
            raw_constraint("user_id", "posts_user_id_fkey", "FOREIGN KEY", Some(("users", "id"))),
            raw_constraint("user_id", "posts_user_id_key", "UNIQUE", Some(("posts", "user_id"))),
        ])
        .expect("group constraints");
        let mut labels = BTreeMap::new();
        labels.insert(
            ("public".to_string(), "post_state".to_string()),
            vec!["draft".to_string(), "live".to_string()],
        );

        let table = map_table(
            vec![
                raw_column("id", "uuid", "uuid"),
                raw_column("user_id", "uuid", "uuid"),
                raw_column("state", USER_DEFINED, "post_state"),
            ],
            constraints,
            &labels,
        );

        assert_eq!(table.table_metadata.column_count, 3);
        assert!(table.table_metadata.has_foreign_keys);
        assert!(table.table_metadata.has_user_defined_keys);
        assert_eq!(table.table_metadata.foreign_constraint_tables, vec!["users"]);

        let user_id = &table.columns[1];
        let entries = user_id.constraint.as_ref().expect("constraints").entries();
        assert_eq!(entries.len(), 2);

        let state = table.columns[2].user_defined_type.as_ref().expect("enum type");
        assert_eq!(state.values, vec!["draft", "live"]);
        assert!(table.columns[2].constraint.is_none());
    }

    #[test]
    fn unknown_constraint_type_is_rejected() {
        let err = group_constraints(vec![raw_constraint("id", "x_excl", "EXCLUDE", None)])
            .unwrap_err();
        assert!(err.to_string().contains("EXCLUDE"));
    }
}
