//! Operator descriptors: the declarative input to the graph builder.
//!
//! An [`Operator`] is a shared handle. Cloning it yields another handle to
//! the same descriptor, and the builder tracks descriptors by handle
//! identity, so two operators that happen to share a type (or even a name)
//! stay distinct.

#![forbid(unsafe_code)]

use crate::buffer::Buffer;
use crate::error::{GraphError, Result};
use crate::graph::PortId;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Operator kind tag, e.g. `"Conv2D"` or `"Const"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpType(pub String);

impl OpType {
    /// The tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OpType {
    fn from(value: &str) -> Self {
        OpType(value.to_string())
    }
}

impl From<String> for OpType {
    fn from(value: String) -> Self {
        OpType(value)
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A declared input: which operator produces it, and from which output.
#[derive(Clone)]
pub struct Input {
    /// The producing operator.
    pub producer: Operator,
    /// The producer's output index.
    pub output: PortId,
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.producer.name(), self.output.0)
    }
}

struct OperatorInner {
    name: String,
    op_type: OpType,
    links: RwLock<Links>,
}

impl Drop for OperatorInner {
    // Unlink iteratively; drop glue would otherwise recurse once per chain link.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.links.get_mut().inputs);
        while let Some(input) = pending.pop() {
            if let Some(mut producer) = Arc::into_inner(input.producer.inner) {
                pending.append(&mut producer.links.get_mut().inputs);
            }
        }
    }
}

#[derive(Default)]
struct Links {
    inputs: Vec<Input>,
    buffers: Vec<Buffer>,
}

/// Shared handle to an operator descriptor.
///
/// Inputs are strong references. A descriptor set wired into a cycle keeps
/// itself alive until one of its members calls [`clear_inputs`](Self::clear_inputs).
#[derive(Clone)]
pub struct Operator {
    inner: Arc<OperatorInner>,
}

impl Operator {
    /// Declare an operator with no inputs and no buffers.
    pub fn new(name: impl Into<String>, op_type: impl Into<OpType>) -> Self {
        Self {
            inner: Arc::new(OperatorInner {
                name: name.into(),
                op_type: op_type.into(),
                links: RwLock::new(Links::default()),
            }),
        }
    }

    /// Append an input fed by `producer`'s first output.
    pub fn with_input(self, producer: &Operator) -> Self {
        self.add_input(producer, PortId(0));
        self
    }

    /// Append an input fed by `producer`'s output `output`.
    pub fn with_input_from(self, producer: &Operator, output: usize) -> Self {
        self.add_input(producer, PortId(output));
        self
    }

    /// Attach a constant buffer.
    pub fn with_buffer(self, buffer: Buffer) -> Self {
        self.attach_buffer(buffer);
        self
    }

    /// Append an input. Returns the slot it occupies.
    pub fn add_input(&self, producer: &Operator, output: PortId) -> PortId {
        let mut links = self.inner.links.write();
        links.inputs.push(Input {
            producer: producer.clone(),
            output,
        });
        PortId(links.inputs.len() - 1)
    }

    /// Replace the input at `slot`, or append when `slot` is one past the end.
    pub fn set_input(&self, slot: usize, producer: &Operator, output: PortId) -> Result<()> {
        let mut links = self.inner.links.write();
        let input = Input {
            producer: producer.clone(),
            output,
        };
        match slot.cmp(&links.inputs.len()) {
            std::cmp::Ordering::Less => links.inputs[slot] = input,
            std::cmp::Ordering::Equal => links.inputs.push(input),
            std::cmp::Ordering::Greater => {
                return Err(GraphError::invalid_argument(format!(
                    "operator '{}' has {} inputs, cannot set slot {}",
                    self.inner.name,
                    links.inputs.len(),
                    slot
                )))
            }
        }
        Ok(())
    }

    /// Drop every declared input.
    pub fn clear_inputs(&self) {
        self.inner.links.write().inputs.clear();
    }

    /// Attach a constant buffer. Returns its index among this operator's buffers.
    pub fn attach_buffer(&self, buffer: Buffer) -> usize {
        let mut links = self.inner.links.write();
        links.buffers.push(buffer);
        links.buffers.len() - 1
    }

    /// The operator's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The operator's kind tag.
    pub fn op_type(&self) -> &OpType {
        &self.inner.op_type
    }

    /// Snapshot of the declared inputs, in slot order.
    pub fn inputs(&self) -> Vec<Input> {
        self.inner.links.read().inputs.clone()
    }

    /// Number of declared inputs.
    pub fn input_count(&self) -> usize {
        self.inner.links.read().inputs.len()
    }

    /// Handles to the attached buffers. Storage is shared, not copied.
    pub fn buffers(&self) -> Vec<Buffer> {
        self.inner.links.read().buffers.clone()
    }

    /// Whether both handles refer to the same descriptor.
    pub fn ptr_eq(&self, other: &Operator) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn key(&self) -> OperatorKey {
        OperatorKey(Arc::as_ptr(&self.inner) as usize)
    }
}

/// Identity of a descriptor, valid while any handle to it is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OperatorKey(usize);

impl fmt::Debug for Operator {
    // Inputs are printed by name only; descriptor sets may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let links = self.inner.links.read();
        f.debug_struct("Operator")
            .field("name", &self.inner.name)
            .field("op_type", &self.inner.op_type)
            .field("inputs", &links.inputs)
            .field("buffers", &links.buffers.len())
            .finish()
    }
}
