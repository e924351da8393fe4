//! Empirical transition model of a decoded label sequence.
//!
//! Labels are indexed by first appearance, adjacent pairs are counted and each
//! row is normalized. The graph keeps one node per observed label and one edge
//! per positive transition probability, self-loops included.

pub mod empirical_matrix;
pub mod graph;
pub mod label_index;

pub use empirical_matrix::EmpiricalTransitionMatrix;
pub use graph::{GraphEdge, GraphNode, TransitionGraph};
pub use label_index::LabelIndex;

use std::hash::Hash;

use tracing::{debug, warn};

/// Build the row-stochastic transition matrix and directed graph of `labels`.
///
/// The matrix is `num_states` x `num_states`, or larger when the sequence holds
/// more distinct labels than that. Rows of labels that are never left are zero.
pub fn build_transition_graph<L: Clone + Eq + Hash>(
    labels: &[L],
    num_states: usize,
) -> (EmpiricalTransitionMatrix, TransitionGraph<L>) {
    let label_index = LabelIndex::from_sequence(labels);

    let size = if label_index.len() > num_states {
        warn!(
            "{} distinct labels for {} states, growing the transition matrix",
            label_index.len(),
            num_states
        );
        label_index.len()
    } else {
        num_states
    };

    let matrix = EmpiricalTransitionMatrix::from_index_sequence(&label_index.encode(labels), size);
    let graph = TransitionGraph::from_matrix(&label_index, &matrix);

    debug!(
        "Transition graph: {} nodes, {} edges from {} transitions",
        graph.node_count(),
        graph.edge_count(),
        matrix.total_transitions()
    );

    (matrix, graph)
}
