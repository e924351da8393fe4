use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use super::empirical_matrix::EmpiricalTransitionMatrix;
use super::label_index::LabelIndex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode<L> {
    pub index: usize,
    pub label: L,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    pub weight: f64,
}

impl GraphEdge {
    /// Weight as shown on diagram edges
    pub fn formatted_weight(&self) -> String {
        format!("{:.2}", self.weight)
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

/// Directed weighted graph over the observed labels.
///
/// Node `index` values are the label indices of the matching
/// [`EmpiricalTransitionMatrix`]. Only strictly positive transitions become edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionGraph<L> {
    nodes: Vec<GraphNode<L>>,
    edges: Vec<GraphEdge>,
}

impl<L: Clone> TransitionGraph<L> {
    pub fn empty() -> Self {
        Self { nodes: Vec::new(), edges: Vec::new() }
    }

    pub fn from_matrix(label_index: &LabelIndex<L>, matrix: &EmpiricalTransitionMatrix) -> Self
    where
        L: Eq + std::hash::Hash,
    {
        let nodes = label_index
            .labels()
            .iter()
            .enumerate()
            .map(|(index, label)| GraphNode { index, label: label.clone() })
            .collect();

        let mut edges = Vec::new();
        for (from, row) in matrix.probabilities().iter().enumerate() {
            for (to, &weight) in row.iter().enumerate() {
                if weight > 0.0 {
                    edges.push(GraphEdge { from, to, weight });
                }
            }
        }

        Self { nodes, edges }
    }

    pub fn nodes(&self) -> &[GraphNode<L>] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn label_of(&self, index: usize) -> Option<&L> {
        self.nodes.get(index).map(|node| &node.label)
    }

    pub fn edge(&self, from: usize, to: usize) -> Option<&GraphEdge> {
        self.edges.iter().find(|edge| edge.from == from && edge.to == to)
    }

    pub fn outgoing(&self, from: usize) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.edges.iter().filter(move |edge| edge.from == from)
    }

    /// Convert into a petgraph `DiGraph`; `NodeIndex::new(i)` is node `i`
    pub fn to_digraph(&self) -> DiGraph<L, f64> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.edges.len());

        for node in &self.nodes {
            graph.add_node(node.label.clone());
        }

        for edge in &self.edges {
            graph.add_edge(NodeIndex::new(edge.from), NodeIndex::new(edge.to), edge.weight);
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> TransitionGraph<&'static str> {
        let sequence = ["a", "a", "b", "a"];
        let label_index = LabelIndex::from_sequence(&sequence);
        let matrix = EmpiricalTransitionMatrix::from_index_sequence(&label_index.encode(&sequence), 2);
        TransitionGraph::from_matrix(&label_index, &matrix)
    }

    #[test]
    fn test_edges_and_self_loops() {
        let graph = sample_graph();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.edge(0, 0).unwrap().is_self_loop());
        assert_eq!(graph.edge(0, 1).unwrap().formatted_weight(), "0.50");
        assert_eq!(graph.edge(1, 0).unwrap().weight, 1.0);
        assert!(graph.edge(1, 1).is_none());
        assert_eq!(graph.outgoing(0).count(), 2);
    }

    #[test]
    fn test_to_digraph() {
        let digraph = sample_graph().to_digraph();

        assert_eq!(digraph.node_count(), 2);
        assert_eq!(digraph.edge_count(), 3);
        assert_eq!(digraph[NodeIndex::new(1)], "b");

        let edge = digraph.find_edge(NodeIndex::new(1), NodeIndex::new(0)).unwrap();
        assert_eq!(digraph[edge], 1.0);
        assert!(digraph.edge_references().all(|edge| *edge.weight() > 0.0));
    }
}
