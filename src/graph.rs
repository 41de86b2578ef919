//! Graph module: the immutable compute graph produced by the builder.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::buffer::{Buffer, BufferId};
use crate::error::{GraphError, Result};
use crate::operator::OpType;
use std::collections::HashMap;

/// Unique identifier for a node: its position in topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Identifier for a port: an output index on a producer, or an input slot
/// on a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub usize);

/// A data dependency from a producer output to a consumer input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// The producer node.
    pub from_node: NodeId,
    /// The producer's output index.
    pub from_port: PortId,
    /// The consumer node.
    pub to_node: NodeId,
    /// The consumer's input slot.
    pub to_port: PortId,
}

/// A node in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// The unique ID of this node.
    pub id: NodeId,
    /// The operator name, unique within the graph.
    pub name: String,
    /// The operator kind.
    pub op_type: OpType,
    /// Number of declared input slots.
    pub input_count: usize,
    /// Attached constant buffers, as indices into the graph's buffer arena.
    pub buffers: Vec<BufferId>,
}

/// The compute graph: an immutable DAG of operator nodes.
///
/// Nodes are stored in topological order, so every edge points from a
/// lower [`NodeId`] to a higher one. The graph owns every attached buffer;
/// they are released together when the graph is dropped.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    nodes: Vec<NodeData>,
    edges: Vec<Edge>,
    buffers: Vec<Buffer>,
    outputs: Vec<NodeId>,
    by_name: HashMap<String, NodeId>,
    incoming: Vec<Vec<usize>>,
    outgoing: Vec<Vec<usize>>,
}

impl Graph {
    /// Create an empty graph.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::from_parts(name.into(), Vec::new(), Vec::new(), Vec::new(), Vec::new())
    }

    /// Assemble a graph from parts already in topological order.
    pub(crate) fn from_parts(
        name: String,
        nodes: Vec<NodeData>,
        edges: Vec<Edge>,
        buffers: Vec<Buffer>,
        outputs: Vec<NodeId>,
    ) -> Self {
        let by_name = nodes
            .iter()
            .map(|node| (node.name.clone(), node.id))
            .collect();
        let mut incoming = vec![Vec::new(); nodes.len()];
        let mut outgoing = vec![Vec::new(); nodes.len()];
        for (index, edge) in edges.iter().enumerate() {
            if let Some(list) = incoming.get_mut(edge.to_node.0) {
                list.push(index);
            }
            if let Some(list) = outgoing.get_mut(edge.from_node.0) {
                list.push(index);
            }
        }
        for list in &mut incoming {
            list.sort_by_key(|&index| edges[index].to_port);
        }
        Self {
            name,
            nodes,
            edges,
            buffers,
            outputs,
            by_name,
            incoming,
            outgoing,
        }
    }

    /// The graph's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nodes in topological order. Producers precede their consumers.
    pub fn nodes(&self) -> &[NodeData] {
        &self.nodes
    }

    /// All edges, grouped by consumer in node order, then by slot.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| GraphError::not_found(format!("node {:?}", id)))
    }

    /// Look up a node by operator name.
    pub fn find_node(&self, name: &str) -> Result<&NodeData> {
        self.by_name
            .get(name)
            .map(|id| &self.nodes[id.0])
            .ok_or_else(|| GraphError::not_found(format!("node '{}'", name)))
    }

    /// Nodes of the terminal operators the graph was built from, in order.
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Leaf nodes (no incoming edges), in node order.
    pub fn inputs(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| self.incoming[node.id.0].is_empty())
            .map(|node| node.id)
            .collect()
    }

    /// Edges feeding `id`, ordered by input slot.
    pub fn in_edges(&self, id: NodeId) -> Result<impl Iterator<Item = &Edge> + '_> {
        let list = self
            .incoming
            .get(id.0)
            .ok_or_else(|| GraphError::not_found(format!("node {:?}", id)))?;
        Ok(list.iter().map(move |&index| &self.edges[index]))
    }

    /// Edges leaving `id`, in edge order.
    pub fn out_edges(&self, id: NodeId) -> Result<impl Iterator<Item = &Edge> + '_> {
        let list = self
            .outgoing
            .get(id.0)
            .ok_or_else(|| GraphError::not_found(format!("node {:?}", id)))?;
        Ok(list.iter().map(move |&index| &self.edges[index]))
    }

    /// Every buffer the graph owns.
    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    /// Get a buffer by ID.
    pub fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        self.buffers
            .get(id.0)
            .ok_or_else(|| GraphError::not_found(format!("buffer {:?}", id)))
    }

    /// Buffers attached to node `id`, in attachment order.
    pub fn node_buffers(&self, id: NodeId) -> Result<Vec<&Buffer>> {
        let node = self.node(id)?;
        node.buffers.iter().map(|&buffer| self.buffer(buffer)).collect()
    }

    /// Check the structural invariants: ids match positions, names are
    /// unique, every edge resolves and points forward, and no input slot is
    /// fed twice.
    pub fn validate(&self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.0 != index {
                return Err(GraphError::invalid_argument(format!(
                    "node '{}' has id {} at position {}",
                    node.name, node.id.0, index
                )));
            }
            if self.by_name.get(&node.name) != Some(&node.id) {
                return Err(GraphError::DuplicateName {
                    name: node.name.clone(),
                });
            }
            if node.buffers.iter().any(|b| b.0 >= self.buffers.len()) {
                return Err(GraphError::not_found(format!(
                    "buffer of node '{}'",
                    node.name
                )));
            }
        }
        for edge in &self.edges {
            let consumer = self.node(edge.to_node)?;
            self.node(edge.from_node)?;
            if edge.from_node >= edge.to_node {
                return Err(GraphError::CycleDetected {
                    operator: consumer.name.clone(),
                });
            }
            if edge.to_port.0 >= consumer.input_count {
                return Err(GraphError::invalid_argument(format!(
                    "edge into slot {} of '{}' which has {} inputs",
                    edge.to_port.0, consumer.name, consumer.input_count
                )));
            }
        }
        for (index, list) in self.incoming.iter().enumerate() {
            let slots = list.iter().map(|&e| self.edges[e].to_port);
            let mut previous = None;
            for slot in slots {
                if previous == Some(slot) {
                    return Err(GraphError::invalid_argument(format!(
                        "slot {} of '{}' is fed twice",
                        slot.0, self.nodes[index].name
                    )));
                }
                previous = Some(slot);
            }
        }
        Ok(())
    }

    /// Build a new graph holding only the nodes needed to compute `outputs`.
    ///
    /// Node order is preserved and ids are renumbered densely. Buffers are
    /// shared with this graph, not copied.
    pub fn pruned(&self, outputs: &[&str]) -> Result<Graph> {
        let mut roots = Vec::with_capacity(outputs.len());
        for name in outputs {
            let id = self.find_node(name)?.id;
            if !roots.contains(&id) {
                roots.push(id);
            }
        }

        let mut live = vec![false; self.nodes.len()];
        let mut stack = roots.clone();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut live[id.0], true) {
                continue;
            }
            for &edge in &self.incoming[id.0] {
                stack.push(self.edges[edge].from_node);
            }
        }

        let mut remap = vec![None; self.nodes.len()];
        let mut nodes = Vec::new();
        let mut buffers = Vec::new();
        for node in self.nodes.iter().filter(|node| live[node.id.0]) {
            let id = NodeId(nodes.len());
            remap[node.id.0] = Some(id);
            let mut kept = Vec::with_capacity(node.buffers.len());
            for &buffer in &node.buffers {
                kept.push(BufferId(buffers.len()));
                buffers.push(self.buffers[buffer.0].clone());
            }
            nodes.push(NodeData {
                id,
                name: node.name.clone(),
                op_type: node.op_type.clone(),
                input_count: node.input_count,
                buffers: kept,
            });
        }

        let edges = self
            .edges
            .iter()
            .filter_map(|edge| {
                Some(Edge {
                    from_node: remap[edge.from_node.0]?,
                    from_port: edge.from_port,
                    to_node: remap[edge.to_node.0]?,
                    to_port: edge.to_port,
                })
            })
            .collect();
        let outputs = roots.iter().filter_map(|id| remap[id.0]).collect();

        Ok(Graph::from_parts(
            self.name.clone(),
            nodes,
            edges,
            buffers,
            outputs,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: usize, name: &str, input_count: usize) -> NodeData {
        NodeData {
            id: NodeId(id),
            name: name.to_string(),
            op_type: OpType::from("Dummy"),
            input_count,
            buffers: Vec::new(),
        }
    }

    fn edge(from: usize, to: usize, slot: usize) -> Edge {
        Edge {
            from_node: NodeId(from),
            from_port: PortId(0),
            to_node: NodeId(to),
            to_port: PortId(slot),
        }
    }

    fn diamond() -> Graph {
        // a -> b, a -> c, (b, c) -> d
        Graph::from_parts(
            "diamond".to_string(),
            vec![node(0, "a", 0), node(1, "b", 1), node(2, "c", 1), node(3, "d", 2)],
            vec![edge(0, 1, 0), edge(0, 2, 0), edge(2, 3, 1), edge(1, 3, 0)],
            Vec::new(),
            vec![NodeId(3)],
        )
    }

    #[test]
    fn graph_lookup_by_name() {
        let graph = diamond();
        assert_eq!(graph.find_node("c").unwrap().id, NodeId(2));
        assert_eq!(
            graph.find_node("missing"),
            Err(GraphError::NotFound("node 'missing'".to_string()))
        );
        assert!(graph.node(NodeId(9)).is_err());
    }

    #[test]
    fn in_edges_sorted_by_slot() {
        let graph = diamond();
        let slots: Vec<_> = graph
            .in_edges(NodeId(3))
            .unwrap()
            .map(|e| (e.from_node, e.to_port))
            .collect();
        assert_eq!(slots, vec![(NodeId(1), PortId(0)), (NodeId(2), PortId(1))]);
        assert_eq!(graph.out_edges(NodeId(0)).unwrap().count(), 2);
        assert_eq!(graph.inputs(), vec![NodeId(0)]);
    }

    #[test]
    fn validate_rejects_backward_edge() {
        let graph = Graph::from_parts(
            "bad".to_string(),
            vec![node(0, "a", 1), node(1, "b", 1)],
            vec![edge(0, 1, 0), edge(1, 0, 0)],
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(
            graph.validate(),
            Err(GraphError::CycleDetected {
                operator: "a".to_string()
            })
        );
        assert!(diamond().validate().is_ok());
    }

    #[test]
    fn validate_rejects_double_fed_slot() {
        let graph = Graph::from_parts(
            "bad".to_string(),
            vec![node(0, "a", 0), node(1, "b", 0), node(2, "c", 1)],
            vec![edge(0, 2, 0), edge(1, 2, 0)],
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(
            graph.validate(),
            Err(GraphError::InvalidArgument(_))
        ));
    }

    #[test]
    fn pruned_keeps_only_ancestors() {
        let graph = diamond();
        let sub = graph.pruned(&["b"]).unwrap();
        let names: Vec<_> = sub.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(sub.edges(), &[edge(0, 1, 0)]);
        assert_eq!(sub.outputs(), &[NodeId(1)]);
        assert!(sub.validate().is_ok());
        // The source graph is untouched.
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn empty_graph() {
        let graph = Graph::empty("nothing");
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.inputs().is_empty());
        assert!(graph.validate().is_ok());
    }
}
