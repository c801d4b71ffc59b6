use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::{Constraint, ConstraintKind, ForeignKeyRef, KeyMembership};
use crate::types::ColumnKind;

/// Schema snapshot for one database namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DatabaseSchema {
    /// Database name when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Tables sorted by name.
    pub tables: Vec<Table>,
    /// Fingerprint of the description this schema was built from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl DatabaseSchema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|table| table.name.clone()).collect()
    }

    /// Every `(table, column)` pair targeted by a foreign key somewhere in the schema.
    pub fn referenced_columns(&self) -> BTreeSet<(String, String)> {
        self.tables
            .iter()
            .flat_map(|table| table.foreign_keys())
            .map(|(_, fk)| (fk.table.clone(), fk.column.clone()))
            .collect()
    }
}

/// A base table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Table {
    pub name: String,
    /// Columns in ordinal order.
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Outgoing foreign keys, one per FK column, in column order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&Column, &ForeignKeyRef)> {
        self.columns.iter().filter_map(|column| {
            column
                .constraint
                .as_ref()
                .and_then(Constraint::foreign_key)
                .map(|fk| (column, fk))
        })
    }

    pub fn has_foreign_keys(&self) -> bool {
        self.foreign_keys().next().is_some()
    }

    /// Names of the tables this table references, in column order.
    pub fn referenced_tables(&self) -> Vec<String> {
        self.foreign_keys().map(|(_, fk)| fk.table.clone()).collect()
    }

    /// PRIMARY KEY and UNIQUE constraints, by name, with their column indices.
    pub fn unique_keys(&self) -> Vec<UniqueKey> {
        let mut keys: BTreeMap<&str, UniqueKey> = BTreeMap::new();
        for (idx, column) in self.columns.iter().enumerate() {
            for membership in &column.keys {
                keys.entry(membership.name.as_str())
                    .or_insert_with(|| UniqueKey {
                        name: membership.name.clone(),
                        kind: membership.kind,
                        columns: Vec::new(),
                    })
                    .columns
                    .push(idx);
            }
        }
        keys.into_values().collect()
    }
}

/// A key constraint whose value tuple must not repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub name: String,
    pub kind: ConstraintKind,
    /// Column indices in table order.
    pub columns: Vec<usize>,
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Column {
    pub name: String,
    /// Raw type as reported by `information_schema.columns.data_type`.
    pub data_type: String,
    pub kind: ColumnKind,
    /// Inverse of `is_nullable`.
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,
    /// Constraint that drives synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    /// Every PRIMARY KEY/UNIQUE constraint the column takes part in, whatever
    /// its effective constraint is.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<KeyMembership>,
}

impl Column {
    pub fn is_primary_key(&self) -> bool {
        matches!(self.constraint, Some(Constraint::PrimaryKey))
    }

    pub fn foreign_key(&self) -> Option<&ForeignKeyRef> {
        self.constraint.as_ref().and_then(Constraint::foreign_key)
    }
}
