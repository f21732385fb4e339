//! Directed graph with deterministic topological ordering.
//!
//! The executor uses this twice: over targets, to decide build order, and
//! over invocation indices, to serialize one target's tool invocations.
//! Ties between independent nodes always resolve to insertion order, so a
//! given graph produces the same schedule on every run.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

/// Errors raised when a graph cannot be linearized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError<N: std::fmt::Debug> {
  /// The graph contains at least one cycle. Carries the nodes that could
  /// not be ordered, in insertion order.
  #[error("dependency cycle detected among {} node(s)", nodes.len())]
  Cycle { nodes: Vec<N> },
}

/// A directed graph from predecessors to dependents.
///
/// Nodes are stored once, keyed by equality; inserting a node again unions
/// its predecessor set with the existing one. The node's position in the
/// deterministic ordering is fixed by the first `insert` that mentioned it,
/// whether as a node or as a predecessor.
#[derive(Debug, Clone, Default)]
pub struct DirectedGraph<N>
where
  N: Clone + Eq + Hash + std::fmt::Debug,
{
  graph: DiGraph<N, ()>,
  indices: HashMap<N, NodeIndex>,
}

impl<N> DirectedGraph<N>
where
  N: Clone + Eq + Hash + std::fmt::Debug,
{
  /// Create an empty graph.
  pub fn new() -> Self {
    Self {
      graph: DiGraph::new(),
      indices: HashMap::new(),
    }
  }

  fn index_of(&mut self, node: &N) -> NodeIndex {
    if let Some(&index) = self.indices.get(node) {
      return index;
    }
    let index = self.graph.add_node(node.clone());
    self.indices.insert(node.clone(), index);
    index
  }

  /// Record `node` and the nodes it depends on.
  ///
  /// Predecessors not seen before are added as nodes of their own.
  pub fn insert<I>(&mut self, node: N, predecessors: I)
  where
    I: IntoIterator<Item = N>,
  {
    let dependent = self.index_of(&node);
    for predecessor in predecessors {
      let predecessor = self.index_of(&predecessor);
      if !self.graph.contains_edge(predecessor, dependent) {
        self.graph.add_edge(predecessor, dependent, ());
      }
    }
  }

  /// Whether `node` has been inserted.
  pub fn contains(&self, node: &N) -> bool {
    self.indices.contains_key(node)
  }

  /// Number of known nodes.
  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  /// Whether the graph has no nodes.
  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Every node exactly once, predecessors before dependents.
  ///
  /// Kahn's algorithm over the stored indices: among the currently ready
  /// nodes the lowest index (the earliest inserted) is emitted first, so
  /// independent nodes keep their insertion order.
  ///
  /// # Errors
  ///
  /// [`GraphError::Cycle`] when some nodes can never become ready; the
  /// error carries exactly those nodes.
  pub fn ordered(&self) -> Result<Vec<N>, GraphError<N>> {
    let mut in_degree: HashMap<NodeIndex, usize> = HashMap::new();
    for index in self.graph.node_indices() {
      in_degree.insert(index, self.graph.neighbors_directed(index, Direction::Incoming).count());
    }

    let mut ready: BTreeSet<NodeIndex> = in_degree
      .iter()
      .filter(|&(_, &degree)| degree == 0)
      .map(|(&index, _)| index)
      .collect();

    let mut order = Vec::with_capacity(self.graph.node_count());
    while let Some(&index) = ready.iter().next() {
      ready.remove(&index);
      order.push(self.graph[index].clone());

      for dependent in self.graph.neighbors_directed(index, Direction::Outgoing) {
        if let Some(degree) = in_degree.get_mut(&dependent) {
          *degree = degree.saturating_sub(1);
          if *degree == 0 {
            ready.insert(dependent);
          }
        }
      }
    }

    if order.len() != self.graph.node_count() {
      let nodes = self
        .graph
        .node_indices()
        .filter(|index| in_degree.get(index).is_some_and(|&degree| degree > 0))
        .map(|index| self.graph[index].clone())
        .collect();
      return Err(GraphError::Cycle { nodes });
    }

    Ok(order)
  }
}
