use std::collections::{BTreeMap, BTreeSet};

use bloatdb_core::DatabaseSchema;
use tracing::{debug, info};

use crate::errors::{PlanError, Result};
use crate::graph::DependencyGraph;
use crate::model::{InsertionPlan, Resolution};

/// Safety cap on trail length; only a malformed graph reaches it.
pub const MAX_TRAIL_DEPTH: usize = 1 << 16;

#[derive(Debug, Clone, Copy)]
struct NodeState {
    level: usize,
    circular: bool,
}

struct Frame {
    table: String,
    children: Vec<String>,
    next: usize,
    state: NodeState,
}

impl Frame {
    fn open(graph: &DependencyGraph, table: &str) -> Self {
        Self {
            table: table.to_string(),
            children: graph.references(table).map(str::to_string).collect(),
            next: 0,
            state: NodeState {
                level: 1,
                circular: false,
            },
        }
    }

    fn absorb(&mut self, child: NodeState) {
        self.state.circular |= child.circular;
        self.state.level = self.state.level.max(child.level + 1);
    }
}

/// Resolve a table set and `(table, referenced_table)` edges.
pub fn resolve<T, E>(tables: T, edges: E) -> Result<Resolution>
where
    T: IntoIterator,
    T::Item: Into<String>,
    E: IntoIterator<Item = (String, String)>,
{
    resolve_graph(&DependencyGraph::from_edges(tables, edges))
}

pub fn resolve_schema(schema: &DatabaseSchema) -> Result<Resolution> {
    resolve_graph(&DependencyGraph::from_schema(schema))
}

/// Compute levels, circular tables and the insertion order for a graph.
///
/// A table is circular when a trail starting from it revisits a table, which
/// covers self-references and every table that can reach a cycle. Each trail
/// stops at the first revisit. Surviving tables are ordered by level (longest
/// trail plus one) and then by name.
pub fn resolve_graph(graph: &DependencyGraph) -> Result<Resolution> {
    let mut memo: BTreeMap<String, NodeState> = BTreeMap::new();

    for root in graph.tables() {
        if memo.contains_key(root) {
            continue;
        }
        walk(graph, root, &mut memo)?;
    }

    let mut levels = BTreeMap::new();
    let mut excluded = Vec::new();
    for (table, state) in &memo {
        if state.circular {
            excluded.push(table.clone());
        } else {
            levels.insert(table.clone(), state.level);
        }
    }

    let mut ordered: Vec<(usize, &String)> = levels.iter().map(|(t, l)| (*l, t)).collect();
    ordered.sort();
    let tables = ordered.into_iter().map(|(_, table)| table.clone()).collect();

    info!(
        event = "insertion_order_resolved",
        nodes = graph.node_count(),
        tables = levels.len(),
        excluded = excluded.len(),
        edges = graph.edge_count()
    );

    Ok(Resolution {
        plan: InsertionPlan::new(tables),
        excluded,
        levels,
    })
}

fn walk(
    graph: &DependencyGraph,
    root: &str,
    memo: &mut BTreeMap<String, NodeState>,
) -> Result<()> {
    let mut on_trail: BTreeSet<String> = BTreeSet::new();
    let mut stack = vec![Frame::open(graph, root)];
    on_trail.insert(root.to_string());

    while let Some(frame) = stack.last_mut() {
        if frame.next < frame.children.len() {
            let child = frame.children[frame.next].clone();
            frame.next += 1;

            if on_trail.contains(&child) {
                debug!(event = "cycle_found", table = %frame.table, revisits = %child);
                frame.state.circular = true;
            } else if let Some(known) = memo.get(&child) {
                frame.absorb(*known);
            } else {
                if stack.len() >= MAX_TRAIL_DEPTH {
                    return Err(PlanError::DepthLimit {
                        table: root.to_string(),
                        limit: MAX_TRAIL_DEPTH,
                    });
                }
                on_trail.insert(child.clone());
                stack.push(Frame::open(graph, &child));
            }
            continue;
        }

        let Some(done) = stack.pop() else {
            break;
        };
        on_trail.remove(&done.table);
        if let Some(parent) = stack.last_mut() {
            parent.absorb(done.state);
        }
        memo.insert(done.table, done.state);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }

    #[test]
    fn chain_orders_leaves_first() {
        let resolution = resolve(
            ["comments", "posts", "users"],
            edges(&[("comments", "posts"), ("posts", "users")]),
        )
        .expect("resolve");
        assert_eq!(resolution.plan.tables(), ["users", "posts", "comments"]);
        assert_eq!(resolution.levels["users"], 1);
        assert_eq!(resolution.levels["comments"], 3);
        assert!(resolution.excluded.is_empty());
    }

    #[test]
    fn diamond_resolves_by_level_then_name() {
        let resolution = resolve(
            ["A", "B", "C", "D"],
            edges(&[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")]),
        )
        .expect("resolve");
        assert_eq!(resolution.plan.tables(), ["D", "B", "C", "A"]);
        assert_eq!(resolution.levels["A"], 3);
    }

    #[test]
    fn lone_self_reference_is_excluded() {
        let resolution = resolve(["employees"], edges(&[("employees", "employees")]))
            .expect("resolve");
        assert!(resolution.plan.is_empty());
        assert_eq!(resolution.excluded, vec!["employees"]);
    }

    #[test]
    fn mutual_pair_and_dependants_are_excluded() {
        let resolution = resolve(
            ["X", "Y", "Z", "users", "posts"],
            edges(&[("X", "Y"), ("Y", "X"), ("Z", "X"), ("posts", "users")]),
        )
        .expect("resolve");
        assert_eq!(resolution.excluded, vec!["X", "Y", "Z"]);
        assert_eq!(resolution.plan.tables(), ["users", "posts"]);
    }

    #[test]
    fn memoised_cycle_member_taints_later_roots() {
        // "a" sorts first, so the cycle is memoised before "z" is walked.
        let resolution = resolve(
            ["a", "b", "z"],
            edges(&[("a", "b"), ("b", "a"), ("z", "b")]),
        )
        .expect("resolve");
        assert_eq!(resolution.excluded, vec!["a", "b", "z"]);
    }

    #[test]
    fn acyclic_graph_respects_every_edge() {
        let pairs = [
            ("orders", "customers"),
            ("orders", "addresses"),
            ("addresses", "customers"),
            ("order_items", "orders"),
            ("order_items", "products"),
            ("products", "vendors"),
            ("reviews", "products"),
            ("reviews", "customers"),
        ];
        let tables = [
            "addresses",
            "customers",
            "order_items",
            "orders",
            "products",
            "reviews",
            "vendors",
        ];
        let resolution = resolve(tables, edges(&pairs)).expect("resolve");

        assert_eq!(resolution.plan.len(), tables.len());
        for (from, to) in pairs {
            let from_pos = resolution.plan.position(from).expect("from present");
            let to_pos = resolution.plan.position(to).expect("to present");
            assert!(to_pos < from_pos, "{to} must precede {from}");
        }
    }

    #[test]
    fn unknown_targets_do_not_affect_order() {
        let resolution =
            resolve(["posts"], edges(&[("posts", "users")])).expect("resolve");
        assert_eq!(resolution.plan.tables(), ["posts"]);
        assert_eq!(resolution.levels["posts"], 1);
    }

    fn chain(count: usize) -> (Vec<String>, Vec<(String, String)>) {
        let names: Vec<String> = (0..count).map(|i| format!("t{i:06}")).collect();
        let pairs = names
            .windows(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        (names, pairs)
    }

    #[test]
    fn deep_acyclic_chains_resolve() {
        let (names, pairs) = chain(5_000);
        let resolution = resolve(names.clone(), pairs).expect("resolve");
        assert!(resolution.excluded.is_empty());
        assert_eq!(resolution.plan.tables().first(), names.last());
        assert_eq!(resolution.levels[&names[0]], 5_000);
    }

    #[test]
    fn long_chains_hit_the_depth_guard() {
        let (names, pairs) = chain(MAX_TRAIL_DEPTH + 2);
        let err = resolve(names, pairs).unwrap_err();
        assert!(matches!(err, PlanError::DepthLimit { .. }));
        assert!(err.to_string().contains("safety limit"));
    }
}
