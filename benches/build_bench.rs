use criterion::{black_box, criterion_group, criterion_main, Criterion};
use opgraph::{build_graph, Buffer, Operator};

fn bench_deep_chain(c: &mut Criterion) {
    // Worst-case depth: a single chain of unary ops.
    let mut ops = vec![Operator::new("input", "Data")];
    for i in 1..1024 {
        let next = Operator::new(format!("relu_{}", i), "Relu").with_input(&ops[i - 1]);
        ops.push(next);
    }
    let terminal = [ops[ops.len() - 1].clone()];

    c.bench_function("build_chain_1024", |b| {
        b.iter(|| {
            let graph = build_graph("chain", black_box(&terminal)).unwrap();
            black_box(graph.node_count());
        })
    });
}

fn bench_wide_fan_in(c: &mut Criterion) {
    let leaves: Vec<_> = (0..256)
        .map(|i| Operator::new(format!("w_{}", i), "Const").with_buffer(Buffer::zeroed(64)))
        .collect();
    let sum = leaves
        .iter()
        .fold(Operator::new("sum", "AddN"), |op, leaf| op.with_input(leaf));
    let terminal = [sum];

    c.bench_function("build_fan_in_256", |b| {
        b.iter(|| {
            let graph = build_graph("fan_in", black_box(&terminal)).unwrap();
            black_box(graph.edge_count());
        })
    });
}

criterion_group!(benches, bench_deep_chain, bench_wide_fan_in);
criterion_main!(benches);
