use std::collections::{BTreeMap, BTreeSet};

use bloatdb_core::DatabaseSchema;
use tracing::warn;

/// Directed FK graph: table -> tables it references.
///
/// Self-edges are kept. Edges pointing outside the table set are dropped when
/// the graph is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Build the graph from a table set and `(table, referenced_table)` pairs.
    pub fn from_edges<T, E>(tables: T, edges: E) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        E: IntoIterator<Item = (String, String)>,
    {
        let mut graph: BTreeMap<String, BTreeSet<String>> = tables
            .into_iter()
            .map(|table| (table.into(), BTreeSet::new()))
            .collect();

        for (from, to) in edges {
            if !graph.contains_key(&to) {
                warn!(
                    event = "fk_edge_ignored",
                    table = %from,
                    referenced_table = %to,
                    reason = "referenced table is not part of the schema"
                );
                continue;
            }
            match graph.get_mut(&from) {
                Some(targets) => {
                    targets.insert(to);
                }
                None => warn!(
                    event = "fk_edge_ignored",
                    table = %from,
                    referenced_table = %to,
                    reason = "table is not part of the schema"
                ),
            }
        }

        Self { edges: graph }
    }

    pub fn from_schema(schema: &DatabaseSchema) -> Self {
        let edges = schema.tables.iter().flat_map(|table| {
            table
                .referenced_tables()
                .into_iter()
                .map(|referenced| (table.name.clone(), referenced))
        });
        Self::from_edges(schema.table_names(), edges)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn references(&self, table: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(table)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }
}
