//! Builder module: turns terminal operator descriptors into a [`Graph`].
//!
//! The builder walks backward from the terminal operators through their
//! declared inputs with an explicit stack. Each operator becomes a node in
//! post-order, which yields a topological order by construction. Cycles are
//! detected through an on-stack marker and duplicate names through a
//! per-build registry. A failed build returns nothing but the error.

#![forbid(unsafe_code)]

use crate::buffer::{Buffer, BufferId};
use crate::config::BuildLimits;
use crate::error::{GraphError, Result};
use crate::graph::{Edge, Graph, NodeData, NodeId, PortId};
use crate::invariant_ppt::{
    assert_invariant, BUFFER_ARENA_OWNED, BUILD_ATOMIC, GRAPH_ACYCLIC, GRAPH_EDGES_RESOLVED,
    GRAPH_REJECTS_INVALID, GRAPH_TOPO_ORDER, GRAPH_UNIQUE_NAMES, LIMITS_ENFORCED,
};
use crate::operator::{Input, Operator, OperatorKey};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

/// Build a graph named `name` from `terminals` with default limits.
pub fn build_graph(name: impl Into<String>, terminals: &[Operator]) -> Result<Graph> {
    GraphBuilder::new(name).build(terminals)
}

/// The graph builder.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    name: String,
    limits: BuildLimits,
}

impl GraphBuilder {
    /// Create a builder for a graph named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limits: BuildLimits::default(),
        }
    }

    /// Replace the build limits.
    pub fn with_limits(mut self, limits: BuildLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The limits this builder enforces.
    pub fn limits(&self) -> &BuildLimits {
        &self.limits
    }

    /// Build the graph reachable backward from `terminals`.
    ///
    /// An empty `terminals` slice yields an empty graph. On error no graph
    /// is produced.
    #[tracing::instrument(skip_all, fields(graph = %self.name, terminals = terminals.len()))]
    pub fn build(&self, terminals: &[Operator]) -> Result<Graph> {
        let result = self.build_inner(terminals);
        match &result {
            Ok(graph) => {
                check_built(graph);
                debug!(
                    nodes = graph.node_count(),
                    edges = graph.edge_count(),
                    buffers = graph.buffers().len(),
                    "graph built"
                );
            }
            Err(err) => {
                let id = match err {
                    GraphError::ResourceExhausted { .. } => LIMITS_ENFORCED,
                    _ => GRAPH_REJECTS_INVALID,
                };
                assert_invariant(id, true, "invalid build rejected", Some("build"));
                assert_invariant(BUILD_ATOMIC, true, "no partial graph returned", Some("build"));
                warn!(error = %err, "graph build rejected");
            }
        }
        result
    }

    fn build_inner(&self, terminals: &[Operator]) -> Result<Graph> {
        BuildLimits::check("max_terminals", self.limits.max_terminals, terminals.len())?;

        let mut walk = Walk::new(&self.limits);
        let mut outputs = Vec::with_capacity(terminals.len());
        let mut seen = HashSet::with_capacity(terminals.len());
        for terminal in terminals {
            let id = walk.visit(terminal)?;
            if seen.insert(id) {
                outputs.push(id);
            }
        }

        Ok(Graph::from_parts(
            self.name.clone(),
            walk.nodes,
            walk.edges,
            walk.buffers,
            outputs,
        ))
    }
}

#[derive(Debug, Clone, Copy)]
enum Mark {
    OnStack,
    Done(NodeId),
}

struct Frame {
    op: Operator,
    inputs: Vec<Input>,
    next: usize,
}

/// State of one backward traversal.
struct Walk<'a> {
    limits: &'a BuildLimits,
    marks: HashMap<OperatorKey, Mark>,
    names: HashMap<String, OperatorKey>,
    // Handles for every visited operator; keeps their identity keys stable.
    visited: Vec<Operator>,
    nodes: Vec<NodeData>,
    edges: Vec<Edge>,
    buffers: Vec<Buffer>,
}

impl<'a> Walk<'a> {
    fn new(limits: &'a BuildLimits) -> Self {
        Self {
            limits,
            marks: HashMap::new(),
            names: HashMap::new(),
            visited: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            buffers: Vec::new(),
        }
    }

    /// Visit `root` and everything it depends on. Returns `root`'s node.
    fn visit(&mut self, root: &Operator) -> Result<NodeId> {
        if let Some(Mark::Done(id)) = self.marks.get(&root.key()) {
            return Ok(*id);
        }

        let mut stack = vec![self.enter(root, 1)?];
        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.inputs.len() {
                let producer = frame.inputs[frame.next].producer.clone();
                frame.next += 1;
                let mark = self.marks.get(&producer.key()).copied();
                match mark {
                    Some(Mark::OnStack) => {
                        return Err(GraphError::CycleDetected {
                            operator: producer.name().to_string(),
                        })
                    }
                    Some(Mark::Done(_)) => {}
                    None => {
                        let depth = stack.len() + 1;
                        let next = self.enter(&producer, depth)?;
                        stack.push(next);
                    }
                }
            } else if let Some(frame) = stack.pop() {
                self.finish(frame)?;
            }
        }

        match self.marks.get(&root.key()) {
            Some(Mark::Done(id)) => Ok(*id),
            _ => Err(GraphError::not_found(format!(
                "node for operator '{}'",
                root.name()
            ))),
        }
    }

    /// First visit: register the name, mark the operator on-stack.
    fn enter(&mut self, op: &Operator, depth: usize) -> Result<Frame> {
        BuildLimits::check("max_depth", self.limits.max_depth, depth)?;
        BuildLimits::check("max_nodes", self.limits.max_nodes, self.visited.len() + 1)?;

        let key = op.key();
        if let Some(&owner) = self.names.get(op.name()) {
            if owner != key {
                return Err(GraphError::DuplicateName {
                    name: op.name().to_string(),
                });
            }
        }
        self.names.insert(op.name().to_string(), key);
        self.marks.insert(key, Mark::OnStack);
        self.visited.push(op.clone());

        Ok(Frame {
            op: op.clone(),
            inputs: op.inputs(),
            next: 0,
        })
    }

    /// Post-order: every input is done, so append the node and its edges.
    fn finish(&mut self, frame: Frame) -> Result<()> {
        let id = NodeId(self.nodes.len());

        for (slot, input) in frame.inputs.iter().enumerate() {
            let from_node = match self.marks.get(&input.producer.key()) {
                Some(Mark::Done(producer)) => *producer,
                _ => {
                    return Err(GraphError::CycleDetected {
                        operator: input.producer.name().to_string(),
                    })
                }
            };
            self.edges.push(Edge {
                from_node,
                from_port: input.output,
                to_node: id,
                to_port: PortId(slot),
            });
        }

        let buffers = frame
            .op
            .buffers()
            .into_iter()
            .map(|buffer| {
                self.buffers.push(buffer);
                BufferId(self.buffers.len() - 1)
            })
            .collect();

        trace!(node = frame.op.name(), id = id.0, "node appended");
        self.nodes.push(NodeData {
            id,
            name: frame.op.name().to_string(),
            op_type: frame.op.op_type().clone(),
            input_count: frame.inputs.len(),
            buffers,
        });
        self.marks.insert(frame.op.key(), Mark::Done(id));
        Ok(())
    }
}

fn check_built(graph: &Graph) {
    let nodes = graph.nodes();
    assert_invariant(
        GRAPH_EDGES_RESOLVED,
        graph
            .edges()
            .iter()
            .all(|e| e.from_node.0 < nodes.len() && e.to_node.0 < nodes.len()),
        "every edge endpoint is a node of the graph",
        Some("build"),
    );
    assert_invariant(
        GRAPH_TOPO_ORDER,
        graph.edges().iter().all(|e| e.from_node < e.to_node),
        "producers precede consumers",
        Some("build"),
    );
    assert_invariant(
        GRAPH_UNIQUE_NAMES,
        nodes
            .iter()
            .all(|n| graph.find_node(&n.name).map(|found| found.id) == Ok(n.id)),
        "node names are unique",
        Some("build"),
    );
    assert_invariant(
        BUFFER_ARENA_OWNED,
        nodes.iter().map(|n| n.buffers.len()).sum::<usize>() == graph.buffers().len(),
        "every attached buffer has exactly one arena slot",
        Some("build"),
    );
    assert_invariant(
        GRAPH_ACYCLIC,
        graph.validate().is_ok(),
        "graph is a valid DAG",
        Some("build"),
    );
}
