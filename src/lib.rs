//! Deterministic operator graph construction.
//!
//! Declare [`Operator`]s with their inputs and constant [`Buffer`]s, then
//! hand the terminal operators to a [`GraphBuilder`]. The result is an
//! immutable [`Graph`] whose nodes are in topological order and which owns
//! every attached buffer.

pub mod buffer;
pub mod builder;
pub mod config;
pub mod error;
pub mod graph;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod operator;

pub use buffer::{Buffer, BufferId};
pub use builder::{build_graph, GraphBuilder};
pub use config::BuildLimits;
pub use error::{GraphError, Result};
pub use graph::{Edge, Graph, NodeData, NodeId, PortId};
pub use operator::{Input, OpType, Operator};
