use opgraph::{build_graph, GraphError, Operator, PortId};
use proptest::prelude::*;
use proptest::sample::Index;

/// For each node, up to three picks among earlier nodes.
fn dag_shape() -> impl Strategy<Value = Vec<Vec<Index>>> {
    (1usize..24).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<Index>(), 0..4), n)
    })
}

fn materialize(shape: &[Vec<Index>], chain: bool) -> Vec<Operator> {
    let mut ops: Vec<Operator> = Vec::with_capacity(shape.len());
    for (i, picks) in shape.iter().enumerate() {
        let op = Operator::new(format!("op{}", i), "Dummy");
        if chain && i > 0 {
            op.add_input(&ops[i - 1], PortId(0));
        }
        if i > 0 {
            for pick in picks {
                op.add_input(&ops[pick.index(i)], PortId(0));
            }
        }
        ops.push(op);
    }
    ops
}

proptest! {
    #[test]
    fn acyclic_sets_build_in_topological_order(shape in dag_shape()) {
        let ops = materialize(&shape, false);
        let graph = build_graph("prop", &ops).unwrap();

        prop_assert_eq!(graph.node_count(), ops.len());
        let declared: usize = ops.iter().map(|op| op.input_count()).sum();
        prop_assert_eq!(graph.edge_count(), declared);
        for edge in graph.edges() {
            prop_assert!(edge.from_node < edge.to_node);
        }
        prop_assert!(graph.validate().is_ok());
    }

    #[test]
    fn builds_are_deterministic(shape in dag_shape()) {
        let ops = materialize(&shape, false);
        let terminals: Vec<_> = ops.iter().rev().cloned().collect();
        let first = build_graph("prop", &terminals).unwrap();
        let second = build_graph("prop", &terminals).unwrap();
        prop_assert_eq!(first.nodes(), second.nodes());
        prop_assert_eq!(first.edges(), second.edges());
    }

    #[test]
    fn back_edge_is_always_detected(shape in dag_shape(), lo in any::<Index>(), hi in any::<Index>()) {
        let ops = materialize(&shape, true);
        let n = ops.len();
        let (a, b) = (lo.index(n), hi.index(n));
        let (consumer, producer) = (a.min(b), a.max(b));
        // `producer` depends on `consumer` through the chain; close the loop.
        ops[consumer].add_input(&ops[producer], PortId(0));

        let result = build_graph("prop", &ops);
        prop_assert!(matches!(result, Err(GraphError::CycleDetected { .. })), "expected CycleDetected");

        for op in &ops {
            op.clear_inputs();
        }
    }
}
