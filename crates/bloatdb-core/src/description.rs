//! JSON schema description exchanged with introspection and the caches.
//!
//! The layout mirrors the cache files the tool has always written: a map of
//! table name to `{columns, @table_metadata}` plus a `@database_metadata`
//! entry. [`DatabaseSchema`] is the typed view the engine works with; the
//! conversion in both directions lives here.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constraints::{Constraint, ConstraintKind, ForeignKeyRef, KeyMembership};
use crate::error::{Error, Result};
use crate::schema::{Column, DatabaseSchema, Table};
use crate::types::{ColumnKind, EnumType};

const USER_DEFINED: &str = "USER-DEFINED";

/// Whole-database description keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDescription {
    #[serde(rename = "@database_metadata", alias = "database_metadata", default)]
    pub database_metadata: DatabaseMetadata,
    #[serde(flatten)]
    pub tables: BTreeMap<String, TableDescription>,
}

/// Tables split by whether they carry foreign keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseMetadata {
    #[serde(default)]
    pub no_foreign_key_tables: Vec<String>,
    #[serde(default, alias = "has_foreign_key_tables")]
    pub foreign_key_tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableDescription {
    pub columns: Vec<ColumnDescription>,
    #[serde(rename = "@table_metadata", alias = "table_metadata", default)]
    pub table_metadata: TableMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableMetadata {
    #[serde(default)]
    pub column_count: usize,
    #[serde(default)]
    pub has_foreign_keys: bool,
    #[serde(default)]
    pub has_user_defined_keys: bool,
    #[serde(default)]
    pub foreign_constraint_tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescription {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub column_default: Option<String>,
    pub is_nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_maximum_length: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<ConstraintField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_defined_type: Option<UserDefinedType>,
}

/// A column's constraints: either one entry or entries keyed by constraint name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ConstraintField {
    Single(ConstraintEntry),
    Named(BTreeMap<String, ConstraintEntry>),
}

impl ConstraintField {
    pub fn entries(&self) -> Vec<&ConstraintEntry> {
        match self {
            ConstraintField::Single(entry) => vec![entry],
            ConstraintField::Named(entries) => entries.values().collect(),
        }
    }

    /// Entries with their constraint names. A single unnamed entry gets the
    /// name Postgres would have given it.
    pub fn named_entries(&self, table: &str, column: &str) -> Vec<(String, &ConstraintEntry)> {
        match self {
            ConstraintField::Single(entry) => {
                vec![(entry.kind.default_name(table, column), entry)]
            }
            ConstraintField::Named(entries) => entries
                .iter()
                .map(|(name, entry)| (name.clone(), entry))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConstraintEntry {
    #[serde(rename = "type")]
    pub kind: ConstraintKind,
    #[serde(default)]
    pub referenced_table: Option<String>,
    #[serde(default)]
    pub referenced_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UserDefinedType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

impl SchemaDescription {
    /// Stable SHA-256 over the canonical JSON encoding.
    pub fn fingerprint(&self) -> Result<String> {
        let encoded = serde_json::to_vec(self).map_err(|err| Error::Other(err.to_string()))?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }

    /// Recompute table and database metadata from the column lists.
    pub fn refresh_metadata(&mut self) {
        let mut metadata = DatabaseMetadata::default();
        for (name, table) in &mut self.tables {
            table.table_metadata = TableMetadata::from_columns(&table.columns);
            if table.table_metadata.has_foreign_keys {
                metadata.foreign_key_tables.push(name.clone());
            } else {
                metadata.no_foreign_key_tables.push(name.clone());
            }
        }
        self.database_metadata = metadata;
    }
}

impl TableMetadata {
    pub fn from_columns(columns: &[ColumnDescription]) -> Self {
        let mut foreign_constraint_tables = Vec::new();
        for column in columns {
            let Some(field) = &column.constraint else {
                continue;
            };
            for entry in field.entries() {
                if entry.kind == ConstraintKind::ForeignKey
                    && let Some(table) = &entry.referenced_table
                {
                    foreign_constraint_tables.push(table.clone());
                }
            }
        }

        Self {
            column_count: columns.len(),
            has_foreign_keys: !foreign_constraint_tables.is_empty(),
            has_user_defined_keys: columns.iter().any(|col| col.data_type == USER_DEFINED),
            foreign_constraint_tables,
        }
    }
}

impl DatabaseSchema {
    /// Build the typed schema from a description.
    pub fn from_description(
        description: &SchemaDescription,
        database: Option<String>,
    ) -> Result<Self> {
        let mut tables = Vec::with_capacity(description.tables.len());
        for (name, table) in &description.tables {
            let columns = table
                .columns
                .iter()
                .map(|column| column_from_description(name, column))
                .collect::<Result<Vec<_>>>()?;
            tables.push(Table {
                name: name.clone(),
                columns,
            });
        }

        Ok(Self {
            database,
            tables,
            fingerprint: Some(description.fingerprint()?),
        })
    }

    /// Regenerate the description, including recomputed metadata.
    pub fn to_description(&self) -> SchemaDescription {
        let mut description = SchemaDescription {
            database_metadata: DatabaseMetadata::default(),
            tables: self
                .tables
                .iter()
                .map(|table| (table.name.clone(), table.to_description()))
                .collect(),
        };
        description.refresh_metadata();
        description
    }
}

impl Table {
    pub fn to_description(&self) -> TableDescription {
        let columns: Vec<ColumnDescription> = self
            .columns
            .iter()
            .map(|column| column.to_description(&self.name))
            .collect();
        TableDescription {
            table_metadata: TableMetadata::from_columns(&columns),
            columns,
        }
    }
}

impl Column {
    /// Key memberships are written as named entries so composite keys and
    /// keys hidden behind a foreign key survive a round trip.
    pub fn to_description(&self, table: &str) -> ColumnDescription {
        let effective = self.constraint.as_ref().map(|constraint| {
            let (referenced_table, referenced_column) = match constraint {
                Constraint::ForeignKey(fk) => (Some(fk.table.clone()), Some(fk.column.clone())),
                _ => (None, None),
            };
            ConstraintEntry {
                kind: constraint.kind(),
                referenced_table,
                referenced_column,
            }
        });

        let constraint = if self.keys.is_empty() {
            effective.map(ConstraintField::Single)
        } else {
            let mut named: BTreeMap<String, ConstraintEntry> = self
                .keys
                .iter()
                .map(|key| {
                    let entry = ConstraintEntry {
                        kind: key.kind,
                        referenced_table: None,
                        referenced_column: None,
                    };
                    (key.name.clone(), entry)
                })
                .collect();
            if let Some(entry) = effective.filter(|entry| !entry.kind.is_key()) {
                named.insert(entry.kind.default_name(table, &self.name), entry);
            }
            Some(ConstraintField::Named(named))
        };
        let user_defined_type = match &self.kind {
            ColumnKind::Enumeration { enum_type } => Some(UserDefinedType {
                name: enum_type.name.clone(),
                schema: enum_type.schema.clone(),
                values: enum_type.labels.clone(),
            }),
            _ => None,
        };

        ColumnDescription {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            column_default: self.default.clone(),
            is_nullable: !self.required,
            character_maximum_length: self.max_length,
            constraint,
            user_defined_type,
        }
    }
}

fn column_from_description(table: &str, column: &ColumnDescription) -> Result<Column> {
    let enum_type = column.user_defined_type.as_ref().map(|udt| EnumType {
        schema: udt.schema.clone(),
        name: udt.name.clone(),
        labels: udt.values.clone(),
    });
    let kind = ColumnKind::classify(&column.data_type, enum_type.as_ref());

    Ok(Column {
        name: column.name.clone(),
        data_type: column.data_type.clone(),
        kind,
        required: !column.is_nullable,
        default: column.column_default.clone(),
        max_length: column.character_maximum_length,
        constraint: effective_constraint(table, column)?,
        keys: key_memberships(table, column),
    })
}

fn key_memberships(table: &str, column: &ColumnDescription) -> Vec<KeyMembership> {
    let Some(field) = &column.constraint else {
        return Vec::new();
    };
    field
        .named_entries(table, &column.name)
        .into_iter()
        .filter(|(_, entry)| entry.kind.is_key())
        .map(|(name, entry)| KeyMembership {
            name,
            kind: entry.kind,
        })
        .collect()
}

/// Pick the constraint that drives synthesis when a column has several.
fn effective_constraint(table: &str, column: &ColumnDescription) -> Result<Option<Constraint>> {
    let Some(field) = &column.constraint else {
        return Ok(None);
    };
    let Some(entry) = field
        .entries()
        .into_iter()
        .min_by_key(|entry| entry.kind.precedence())
    else {
        return Ok(None);
    };

    let constraint = match entry.kind {
        ConstraintKind::PrimaryKey => Constraint::PrimaryKey,
        ConstraintKind::Unique => Constraint::Unique,
        ConstraintKind::Check => Constraint::Check,
        ConstraintKind::ForeignKey => {
            let (Some(referenced_table), Some(referenced_column)) =
                (&entry.referenced_table, &entry.referenced_column)
            else {
                return Err(Error::InvalidSchema(format!(
                    "foreign key on {}.{} is missing its referenced table or column",
                    table, column.name
                )));
            };
            Constraint::ForeignKey(ForeignKeyRef {
                table: referenced_table.clone(),
                column: referenced_column.clone(),
            })
        }
    };

    Ok(Some(constraint))
}
