use std::collections::{ BTreeMap, BTreeSet };

use log::warn;
use petgraph::algo::{ condensation, tarjan_scc, toposort };
use petgraph::graph::{ DiGraph, NodeIndex };
use petgraph::visit::Dfs;

use crate::models::claim::MathClaim;
use crate::models::statement::FormalStatement;

/// Directed statement → dependency graph of one request.
///
/// Edges come from each statement's declared dependencies plus edges induced
/// by claim dependencies: when claim A builds on claim B, every statement
/// supporting A depends on every statement supporting B. Nodes and edges are
/// inserted in sorted order so every traversal is independent of input order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: BTreeMap<String, NodeIndex>,
    depths: BTreeMap<String, usize>,
}

impl DependencyGraph {
    pub fn build(statements: &[FormalStatement], claims: &[MathClaim]) -> Self {
        let mut edges: BTreeMap<&str, BTreeSet<&str>> = statements
            .iter()
            .map(|s| (s.id.as_str(), BTreeSet::new()))
            .collect();

        for statement in statements {
            for dep in &statement.dependencies {
                if dep != &statement.id && edges.contains_key(dep.as_str()) {
                    if let Some(targets) = edges.get_mut(statement.id.as_str()) {
                        targets.insert(dep.as_str());
                    }
                }
            }
        }

        let claims_by_id: BTreeMap<&str, &MathClaim> = claims
            .iter()
            .map(|c| (c.id.as_str(), c))
            .collect();
        for claim in claims {
            for dep_claim in claim.dependencies.iter().filter_map(|id| claims_by_id.get(id.as_str())) {
                for from in &claim.statement_ids {
                    for to in &dep_claim.statement_ids {
                        if from != to && edges.contains_key(to.as_str()) {
                            if let Some(targets) = edges.get_mut(from.as_str()) {
                                targets.insert(to.as_str());
                            }
                        }
                    }
                }
            }
        }

        let mut graph = DiGraph::new();
        let nodes: BTreeMap<String, NodeIndex> = edges
            .keys()
            .map(|id| (id.to_string(), graph.add_node(id.to_string())))
            .collect();
        for (from, targets) in &edges {
            for to in targets {
                graph.add_edge(nodes[*from], nodes[*to], ());
            }
        }

        let depths = chain_depths(&graph);
        Self { graph, nodes, depths }
    }

    /// Everything `id` relies on, directly or transitively (excluding `id` unless it sits on a cycle)
    pub fn closure(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let Some(&start) = self.nodes.get(id) else {
            return seen;
        };

        let mut dfs = Dfs::empty(&self.graph);
        dfs.stack.extend(self.graph.neighbors(start));
        while let Some(node) = dfs.next(&self.graph) {
            seen.insert(self.graph[node].clone());
        }
        seen
    }

    /// Number of edges on the longest dependency chain starting at `id`.
    ///
    /// A dependency cycle counts as a chain through all of its members.
    pub fn longest_chain(&self, id: &str) -> usize {
        self.depths.get(id).copied().unwrap_or(0)
    }

    /// Strongly connected components with more than one member, i.e. dependency cycles.
    ///
    /// Each component is returned sorted; components come out in order of their
    /// smallest member.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut ids: Vec<String> = component
                    .into_iter()
                    .map(|node| self.graph[node].clone())
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }
}

/// Longest chain from every statement, via the condensation's topological order
fn chain_depths(graph: &DiGraph<String, ()>) -> BTreeMap<String, usize> {
    let condensed = condensation(graph.clone(), true);
    let order = match toposort(&condensed, None) {
        Ok(order) => order,
        Err(cycle) => {
            warn!("Condensed dependency graph still has a cycle at {:?}", cycle.node_id());
            return BTreeMap::new();
        }
    };

    // Dependencies come after their dependents, so walk the order backwards
    let mut component_depth = vec![0usize; condensed.node_count()];
    for &component in order.iter().rev() {
        let inner = condensed[component].len().saturating_sub(1);
        let outer = condensed
            .neighbors(component)
            .map(|dep| 1 + component_depth[dep.index()])
            .max()
            .unwrap_or(0);
        component_depth[component.index()] = inner + outer;
    }

    condensed
        .node_indices()
        .flat_map(|component| {
            let depth = component_depth[component.index()];
            condensed[component].iter().map(move |id| (id.clone(), depth))
        })
        .collect()
}
