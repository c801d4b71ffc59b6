use std::collections::BTreeMap;

use bloatdb_core::{DatabaseSchema, Error as CoreError, TableDescription};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tables in the order they are seeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertionPlan {
    tables: Vec<String>,
}

impl InsertionPlan {
    pub fn new(tables: Vec<String>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn position(&self, table: &str) -> Option<usize> {
        self.tables.iter().position(|name| name == table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }
}

/// Outcome of insertion-order resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub plan: InsertionPlan,
    /// Circular tables, sorted. Reported, never seeded.
    pub excluded: Vec<String>,
    /// Level of every table in `plan`.
    pub levels: BTreeMap<String, usize>,
}

/// Serialized insertion order: `1..N -> {table: description}` plus exclusions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OrderedPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_fingerprint: Option<String>,
    pub order: BTreeMap<usize, BTreeMap<String, TableDescription>>,
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl OrderedPlan {
    pub fn from_resolution(
        resolution: &Resolution,
        schema: &DatabaseSchema,
    ) -> Result<Self, CoreError> {
        let mut order = BTreeMap::new();
        for (idx, name) in resolution.plan.iter().enumerate() {
            let table = schema.table(name).ok_or_else(|| {
                CoreError::InvalidSchema(format!("planned table not in schema: {name}"))
            })?;
            let mut entry = BTreeMap::new();
            entry.insert(name.to_string(), table.to_description());
            order.insert(idx + 1, entry);
        }

        Ok(Self {
            database: schema.database.clone(),
            schema_fingerprint: schema.fingerprint.clone(),
            order,
            excluded: resolution.excluded.clone(),
        })
    }

    /// Table names in position order.
    pub fn table_names(&self) -> Vec<String> {
        self.order
            .values()
            .flat_map(|entry| entry.keys().cloned())
            .collect()
    }

    pub fn insertion_plan(&self) -> InsertionPlan {
        InsertionPlan::new(self.table_names())
    }

    /// `"<n> - <table>"` lines, one per planned table.
    pub fn display_lines(&self) -> Vec<String> {
        self.order
            .iter()
            .flat_map(|(position, entry)| {
                entry.keys().map(move |name| format!("{position} - {name}"))
            })
            .collect()
    }
}
