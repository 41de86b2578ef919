//! Caller-imposed limits on a graph build.

use crate::error::{GraphError, Result};

/// Bounds checked while building; exceeding one fails the build with
/// [`GraphError::ResourceExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildLimits {
    /// Maximum number of terminal operators passed to one build.
    pub max_terminals: usize,
    /// Maximum number of nodes in the built graph.
    pub max_nodes: usize,
    /// Maximum dependency chain length from a terminal operator.
    pub max_depth: usize,
}

impl BuildLimits {
    /// Limits that never trigger.
    pub fn unbounded() -> Self {
        Self {
            max_terminals: usize::MAX,
            max_nodes: usize::MAX,
            max_depth: usize::MAX,
        }
    }

    pub fn with_max_terminals(mut self, max: usize) -> Self {
        self.max_terminals = max;
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    pub(crate) fn check(limit: &'static str, max: usize, value: usize) -> Result<()> {
        if value > max {
            return Err(GraphError::ResourceExhausted { limit, max, value });
        }
        Ok(())
    }
}

impl Default for BuildLimits {
    fn default() -> Self {
        Self {
            max_terminals: usize::MAX,
            max_nodes: 1 << 20,
            max_depth: 1 << 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_chain() {
        let limits = BuildLimits::default()
            .with_max_terminals(2)
            .with_max_nodes(10)
            .with_max_depth(3);
        assert_eq!(limits.max_terminals, 2);
        assert_eq!(limits.max_nodes, 10);
        assert_eq!(limits.max_depth, 3);
    }

    #[test]
    fn check_reports_limit() {
        assert!(BuildLimits::check("max_nodes", 3, 3).is_ok());
        assert_eq!(
            BuildLimits::check("max_nodes", 3, 4),
            Err(GraphError::ResourceExhausted {
                limit: "max_nodes",
                max: 3,
                value: 4
            })
        );
    }
}
