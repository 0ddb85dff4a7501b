//! Benchmarks for the super-step engine's throughput on a long linear chain.

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use loomgraph::control::NodePartial;
use loomgraph::error::NodeError;
use loomgraph::graph::GraphBuilder;
use loomgraph::invoke::{invoke, InvokeInput, InvokeOptions};
use loomgraph::node::{Node, NodeContext};
use loomgraph::schema::Schema;
use loomgraph::state::StateSnapshot;
use rustc_hash::FxHashMap;
use serde_json::json;
use tokio::runtime::Runtime;

/// A no-op node for measuring pure super-step overhead.
struct Tick;

#[async_trait]
impl Node for Tick {
    async fn run(&self, state: &StateSnapshot, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
        let count = state.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
        let mut update = FxHashMap::default();
        update.insert("count".to_string(), json!(count + 1));
        Ok(NodePartial::update(update))
    }
}

fn build_linear_chain(length: usize) -> Arc<loomgraph::graph::CompiledGraph> {
    let schema = Schema::new().with_key("count", json!(0));
    let mut builder = GraphBuilder::new(schema);
    for i in 0..length {
        builder = builder.add_node(format!("tick_{i}"), Tick);
    }
    builder = builder.add_edge("__start__", "tick_0");
    for i in 0..length.saturating_sub(1) {
        builder = builder.add_edge(format!("tick_{i}"), format!("tick_{}", i + 1));
    }
    if length > 0 {
        builder = builder.add_edge(format!("tick_{}", length - 1), "__end__");
    }
    Arc::new(builder.compile().expect("linear chain compiles"))
}

fn bench_linear_chain(c: &mut Criterion) {
    let runtime = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("engine_super_steps");

    for &length in &[10usize, 100, 500] {
        let graph = build_linear_chain(length);
        group.throughput(Throughput::Elements(length as u64));
        group.bench_with_input(BenchmarkId::from_parameter(length), &graph, |b, graph| {
            let options = InvokeOptions::new().with_recursion_limit(length as u64 + 1);
            b.to_async(&runtime).iter(|| async {
                invoke(graph.clone(), InvokeInput::Update(FxHashMap::default()), options.clone())
                    .await
                    .expect("invocation succeeds")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_linear_chain);
criterion_main!(benches);
