//! Error type shared by buffers, the graph builder and built graphs.

use thiserror::Error;

/// Errors raised while constructing buffers, building graphs, or querying them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Malformed construction parameters (buffer parts, input slots).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Two distinct operators share a name within one build.
    #[error("duplicate operator name '{name}'")]
    DuplicateName {
        /// The colliding name.
        name: String,
    },
    /// The dependency structure is not acyclic.
    #[error("dependency cycle closes at operator '{operator}'")]
    CycleDetected {
        /// The operator at which the cycle closes.
        operator: String,
    },
    /// Lookup miss on a built graph.
    #[error("not found: {0}")]
    NotFound(String),
    /// A caller-imposed build limit was exceeded.
    #[error("resource exhausted: {limit} limit is {max}, got {value}")]
    ResourceExhausted {
        /// Which limit was hit.
        limit: &'static str,
        /// The configured maximum.
        max: usize,
        /// The value that exceeded it.
        value: usize,
    },
}

impl GraphError {
    /// Create an invalid-argument error with a custom message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        GraphError::InvalidArgument(msg.into())
    }

    /// Create a not-found error with a custom message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        GraphError::NotFound(msg.into())
    }
}

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, GraphError>;
