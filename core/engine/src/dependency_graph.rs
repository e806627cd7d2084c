//! FILENAME: core/engine/src/dependency_graph.rs
//! PURPOSE: Directed graph of the dependencies between parameter expressions.
//! CONTEXT: Nodes are parameter names. Flag tokens are mapped to their owning
//! Enum parameter before they get here, so an edge always joins two declared
//! parameters. The graph answers two questions: is there a cycle, and in which
//! order can the expressions be evaluated.
//!
//! TERMINOLOGY:
//! - Precedents: Parameters an expression references (its inputs).
//!   If c = a + b, then a and b are precedents of c.
//! - Dependents: Parameters whose expression references a given parameter.
//!   If c = a + b, then c is a dependent of a and b.

use crate::error::DependencyCycleError;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Visit {
    InProgress,
    Done,
}

/// Tracks both directions of every edge so that either lookup is direct.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Every node, including parameters with no edges at all.
    nodes: BTreeSet<String>,

    /// For each parameter, the parameters it directly depends on.
    precedents: FxHashMap<String, BTreeSet<String>>,

    /// For each parameter, the parameters that directly depend on it.
    dependents: FxHashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    /// Adds a node without edges. No-op if it already exists.
    pub fn add_node(&mut self, node: impl Into<String>) {
        self.nodes.insert(node.into());
    }

    /// Records that `node` depends on `precedent`. Both become nodes.
    ///
    /// # Arguments
    /// * `node` - The parameter whose expression references `precedent`.
    /// * `precedent` - The parameter being referenced.
    pub fn add_dependency(&mut self, node: impl Into<String>, precedent: impl Into<String>) {
        let node = node.into();
        let precedent = precedent.into();

        self.nodes.insert(node.clone());
        self.nodes.insert(precedent.clone());
        self.dependents
            .entry(precedent.clone())
            .or_default()
            .insert(node.clone());
        self.precedents.entry(node).or_default().insert(precedent);
    }

    /// Returns one cycle, its members in dependency order, or `None` when
    /// the graph is acyclic. Nodes are explored in name order, so the same
    /// graph always reports the same cycle.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut state: FxHashMap<&str, Visit> = FxHashMap::default();
        let mut path: Vec<&str> = Vec::new();

        for node in &self.nodes {
            if state.contains_key(node.as_str()) {
                continue;
            }
            if let Some(cycle) = self.visit(node, &mut state, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        state: &mut FxHashMap<&'a str, Visit>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        state.insert(node, Visit::InProgress);
        path.push(node);

        if let Some(precedents) = self.precedents.get(node) {
            for precedent in precedents {
                match state.get(precedent.as_str()) {
                    Some(Visit::InProgress) => {
                        let start = path.iter().position(|n| *n == precedent.as_str())?;
                        return Some(path[start..].iter().map(|n| n.to_string()).collect());
                    }
                    Some(Visit::Done) => {}
                    None => {
                        if let Some(cycle) = self.visit(precedent, state, path) {
                            return Some(cycle);
                        }
                    }
                }
            }
        }

        path.pop();
        state.insert(node, Visit::Done);
        None
    }

    /// Every node, dependencies before dependents (Kahn's algorithm). Among
    /// nodes that are ready at the same time, the smallest name goes first.
    ///
    /// # Returns
    /// The evaluation order, or the members of one cycle when no such
    /// order exists.
    pub fn topological_order(&self) -> Result<Vec<String>, DependencyCycleError> {
        let mut in_degree: FxHashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|node| {
                let degree = self.precedents.get(node).map_or(0, BTreeSet::len);
                (node.as_str(), degree)
            })
            .collect();

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&node, _)| node)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_first() {
            order.push(node.to_string());

            if let Some(dependents) = self.dependents.get(node) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(dependent.as_str());
                        }
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let parameters = self.find_cycle().unwrap_or_else(|| {
                // Unreachable for a consistent graph; report the leftovers
                in_degree
                    .iter()
                    .filter(|(_, &degree)| degree > 0)
                    .map(|(node, _)| node.to_string())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            });
            return Err(DependencyCycleError { parameters });
        }

        Ok(order)
    }
}
