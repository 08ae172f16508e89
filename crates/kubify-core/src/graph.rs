//! Reference graph between resources, backed by `petgraph`.
//!
//! An edge `B -> A` means A's text references B, so B must be resolved
//! first. Self references are not edges; the resolver decides whether a
//! self reference actually loops.

use crate::expression::{self, MalformedExpression};
use crate::manifest::Manifest;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug)]
pub struct DependencyGraph {
    /// Node indices follow manifest order.
    graph: DiGraph<String, ()>,
}

impl DependencyGraph {
    /// Scan every expression-bearing field of every resource and record
    /// which resources it references.
    pub fn build(manifest: &Manifest) -> Result<Self, GraphError> {
        let mut graph = DiGraph::with_capacity(manifest.len(), manifest.len());
        for resource in manifest.resources() {
            graph.add_node(resource.name.clone());
        }

        for (index, resource) in manifest.resources().iter().enumerate() {
            let dependent = NodeIndex::new(index);
            for field in resource.expressions() {
                let references =
                    expression::references(field.text).map_err(|source| GraphError::Malformed {
                        resource: resource.name.clone(),
                        field: field.to_string(),
                        source,
                    })?;

                for reference in references {
                    let dependency = manifest.position(&reference.resource).ok_or_else(|| {
                        GraphError::UnknownResource {
                            resource: resource.name.clone(),
                            target: reference.resource.clone(),
                        }
                    })?;
                    if dependency != index {
                        graph.update_edge(NodeIndex::new(dependency), dependent, ());
                    }
                }
            }
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built reference graph"
        );
        Ok(Self { graph })
    }

    /// Names of the resources `name` references directly, in manifest order.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        let Some(node) = self.node(name) else {
            return Vec::new();
        };
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        deps.sort();
        deps.iter().map(|&idx| self.graph[idx].as_str()).collect()
    }

    /// Topological order, dependencies first. Among resources whose
    /// dependencies are all satisfied, manifest order wins.
    pub fn resolve_order(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(self.graph[node].clone());
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < self.graph.node_count() {
            return Err(GraphError::CyclicDependency {
                cycle: self.cycle_members(),
            });
        }
        Ok(order)
    }

    fn node(&self, name: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| self.graph[idx] == name)
    }

    fn cycle_members(&self) -> Vec<String> {
        let Some(mut component) = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .find(|scc| scc.len() > 1)
        else {
            return Vec::new();
        };
        component.sort();
        component
            .into_iter()
            .map(|idx| self.graph[idx].clone())
            .collect()
    }
}

/// Convenience: build the graph and compute the resolution order.
pub fn resolution_order(manifest: &Manifest) -> Result<Vec<String>, GraphError> {
    DependencyGraph::build(manifest)?.resolve_order()
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("resource '{resource}' field {field}: {source}")]
    Malformed {
        resource: String,
        field: String,
        source: MalformedExpression,
    },

    #[error("resource '{resource}' references unknown resource '{target}'")]
    UnknownResource { resource: String, target: String },

    #[error("cyclic dependency between resources: {}", cycle.join(", "))]
    CyclicDependency { cycle: Vec<String> },
}
