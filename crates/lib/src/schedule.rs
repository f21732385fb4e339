//! Invocation scheduling within one target.
//!
//! A target's invocations arrive in phase order, but their real ordering
//! constraints are the paths they exchange: an invocation that consumes a
//! path must run after the invocation that declares it as an output. This
//! module infers those edges and linearizes them.

use std::collections::HashMap;

use crate::graph::{DirectedGraph, GraphError};
use crate::invocation::Invocation;

/// Compute an execution order over `invocations`.
///
/// Returns indices into the slice such that every producer precedes its
/// consumers. Construction:
///
/// 1. Index every declared output (real, phony, and dependency) to the
///    invocation declaring it. When two invocations declare the same
///    string, the later one wins as its producer.
/// 2. For every consumed input found in the index, add an edge from the
///    producer. Inputs with no producer refer to source files or external
///    artifacts and are ignored; self-references are elided.
/// 3. Topologically order, ties in listed order.
///
/// Phony invocations participate like any other; the executor skips their
/// execution later.
///
/// # Errors
///
/// [`GraphError::Cycle`] when the declared inputs and outputs are
/// circular, carrying the indices of the entangled invocations.
pub fn schedule(invocations: &[Invocation]) -> Result<Vec<usize>, GraphError<usize>> {
  let mut output_index: HashMap<&str, usize> = HashMap::new();
  for (index, invocation) in invocations.iter().enumerate() {
    for output in invocation.declared_outputs() {
      output_index.insert(output, index);
    }
  }

  let mut graph = DirectedGraph::new();
  for (index, invocation) in invocations.iter().enumerate() {
    graph.insert(index, std::iter::empty());

    for input in invocation.consumed_inputs() {
      if let Some(&producer) = output_index.get(input)
        && producer != index
      {
        graph.insert(index, [producer]);
      }
    }
  }

  graph.ordered()
}
