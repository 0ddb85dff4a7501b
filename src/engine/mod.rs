//! The super-step engine. Drives the BSP/Pregel loop:
//! `IDLE -> (RUN_STEP <-> COMMIT_STEP) -> {DONE, INTERRUPTED, FAILED, LIMIT_EXCEEDED}`.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn, Instrument};

use crate::checkpoint::{Checkpoint, CheckpointConfig, PendingInterrupt};
use crate::control::NodePartial;
use crate::error::{EngineError, EngineResult, NodeError};
use crate::graph::CompiledGraph;
use crate::interrupt;
use crate::node::{InvokeContext, NodeContext};
use crate::routing;
use crate::state::{apply_update, inject_managed, strip_managed, StateMap};
use crate::stream::{DoneEvent, EventSink, StreamEvent};
use crate::types::NodeId;

/// What an invocation terminates with, absent a fatal error (which is
/// surfaced as `Err(EngineError)` instead).
#[derive(Debug, Clone)]
pub enum Outcome {
    Done { state: StateMap },
    Interrupted { payload: Value, state: StateMap },
}

/// What one super-step produces: either the loop is finished, suspended, or
/// has a state/frontier to carry into the next super-step.
enum StepOutcome {
    Done { state: StateMap },
    Interrupted { payload: Value, state: StateMap },
    Continue { state: StateMap, frontier: Vec<NodeId> },
}

/// Runs the super-step loop to completion (or suspension), starting from
/// `frontier` at `step`. `resume` is `Some((node, value))` only on the
/// specialized resume pass: it seeds the interrupt channel for that one node
/// and is consumed on the very first iteration.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run(
    graph: Arc<CompiledGraph>,
    mut state: StateMap,
    mut frontier: Vec<NodeId>,
    mut step: u64,
    recursion_limit: u64,
    thread_id: Option<String>,
    context: Option<InvokeContext>,
    mut resume: Option<(NodeId, Value)>,
    sink: EventSink,
) -> EngineResult<Outcome> {
    let invocation_id = uuid::Uuid::new_v4();
    loop {
        let span = tracing::info_span!("super_step", %invocation_id, step, active_nodes = ?frontier);
        let outcome = run_one_step(
            &graph,
            state,
            frontier,
            step,
            recursion_limit,
            thread_id.as_deref(),
            context.clone(),
            resume.take(),
            &sink,
        )
        .instrument(span)
        .await?;

        match outcome {
            StepOutcome::Done { state } => {
                sink.emit(StreamEvent::Done(DoneEvent::Ok { state: state.clone() }));
                return Ok(Outcome::Done { state });
            }
            StepOutcome::Interrupted { payload, state } => {
                sink.emit(StreamEvent::Done(DoneEvent::Interrupt {
                    payload: payload.clone(),
                    state: state.clone(),
                }));
                return Ok(Outcome::Interrupted { payload, state });
            }
            StepOutcome::Continue { state: next_state, frontier: next_frontier } => {
                state = next_state;
                frontier = next_frontier;
                step += 1;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one_step(
    graph: &Arc<CompiledGraph>,
    state: StateMap,
    mut frontier: Vec<NodeId>,
    step: u64,
    recursion_limit: u64,
    thread_id: Option<&str>,
    context: Option<InvokeContext>,
    resume: Option<(NodeId, Value)>,
    sink: &EventSink,
) -> EngineResult<StepOutcome> {
    frontier.retain(|n| !n.is_end());
    if frontier.is_empty() {
        return Ok(StepOutcome::Done { state });
    }

    if step >= recursion_limit {
        warn!(step, limit = recursion_limit, ?frontier, "recursion limit exceeded");
        return Err(EngineError::RecursionLimitExceeded {
            limit: recursion_limit,
            step,
            frontier,
        });
    }

    sink.emit(StreamEvent::StepStart { step, active: frontier.clone() });

    let mut state_for_nodes = state.clone();
    inject_managed(&mut state_for_nodes, step, recursion_limit);

    let exec = if frontier.len() == 1 {
        run_singleton(graph, &state_for_nodes, &frontier[0], step, recursion_limit, context, resume, sink).await?
    } else {
        run_parallel(graph, &state_for_nodes, &frontier, step, recursion_limit, context, sink).await?
    };

    let (executed, interrupted) = match exec {
        ExecOutcome::Completed(results) => (results, None),
        ExecOutcome::Interrupted { node, payload } => (Vec::new(), Some((node, payload))),
    };

    if let Some((node, payload)) = interrupted {
        let mut captured = state_for_nodes;
        strip_managed(&mut captured);
        if let (Some(store), Some(tid)) = (graph.checkpointer(), thread_id) {
            let cfg = CheckpointConfig::for_thread(tid);
            let checkpoint = Checkpoint::new(tid, None, captured.clone(), vec![node.clone()], step)
                .with_pending_interrupts(vec![PendingInterrupt { value: payload.clone(), node }]);
            debug!(thread_id = tid, step, "persisting interrupt checkpoint");
            store.save(&cfg, checkpoint).await?;
        }
        return Ok(StepOutcome::Interrupted { payload, state: captured });
    }

    let mut next_state = state_for_nodes;
    let mut command_gotos = Vec::new();
    let executed_nodes: Vec<NodeId> = executed.iter().map(|(id, _)| id.clone()).collect();
    for (node, partial) in &executed {
        next_state = apply_update(&next_state, &partial.update, graph.reducers());
        command_gotos.extend(partial.goto.iter().cloned());
        debug!(node = %node, step, outcome = "update", "node completed");
    }
    strip_managed(&mut next_state);

    sink.emit(StreamEvent::StepEnd { step, state: next_state.clone() });

    let next_frontier = routing::resolve_frontier(
        graph,
        &executed_nodes,
        &command_gotos,
        &next_state,
        step,
        recursion_limit,
    )
    .await
    .map_err(|err| {
        warn!(error = %err, "routing resolution failed");
        EngineError::Routing(err)
    })?;

    if let (Some(store), Some(tid)) = (graph.checkpointer(), thread_id) {
        let cfg = CheckpointConfig::for_thread(tid);
        let checkpoint = Checkpoint::new(tid, None, next_state.clone(), next_frontier.clone(), step);
        debug!(thread_id = tid, step, "persisting checkpoint");
        store.save(&cfg, checkpoint).await?;
    }

    Ok(StepOutcome::Continue { state: next_state, frontier: next_frontier })
}

enum ExecOutcome {
    Completed(Vec<(NodeId, NodePartial)>),
    Interrupted { node: NodeId, payload: Value },
}

#[allow(clippy::too_many_arguments)]
async fn run_singleton(
    graph: &Arc<CompiledGraph>,
    state: &StateMap,
    node_id: &NodeId,
    step: u64,
    recursion_limit: u64,
    context: Option<InvokeContext>,
    resume: Option<(NodeId, Value)>,
    sink: &EventSink,
) -> EngineResult<ExecOutcome> {
    let node = graph.node(node_id).cloned().ok_or_else(|| {
        EngineError::Node(NodeError::Failed {
            node: node_id.clone(),
            message: "routed to a name with no registered node implementation".to_string(),
        })
    })?;

    let resume_value = resume.and_then(|(n, v)| if &n == node_id { Some(v) } else { None });
    let ctx = NodeContext::new(node_id.clone(), step, recursion_limit, context);

    sink.emit(StreamEvent::NodeStart { node: node_id.clone() });
    let result = interrupt::with_resume_scope(resume_value, || async { node.run(state, &ctx).await }).await;

    match result {
        Ok(partial) => {
            sink.emit(StreamEvent::NodeEnd { node: node_id.clone(), update: partial.update.clone() });
            Ok(ExecOutcome::Completed(vec![(node_id.clone(), partial)]))
        }
        Err(NodeError::Interrupted(payload)) => {
            debug!(node = %node_id, step, outcome = "interrupt", "node suspended");
            Ok(ExecOutcome::Interrupted { node: node_id.clone(), payload })
        }
        Err(other) => Err(EngineError::Node(other)),
    }
}

async fn run_parallel(
    graph: &Arc<CompiledGraph>,
    state: &StateMap,
    frontier: &[NodeId],
    step: u64,
    recursion_limit: u64,
    context: Option<InvokeContext>,
    sink: &EventSink,
) -> EngineResult<ExecOutcome> {
    let mut set: JoinSet<(NodeId, Result<NodePartial, NodeError>)> = JoinSet::new();
    let mut task_nodes: FxHashMap<tokio::task::Id, NodeId> = FxHashMap::default();

    for node_id in frontier {
        let node = graph.node(node_id).cloned().ok_or_else(|| {
            EngineError::Node(NodeError::Failed {
                node: node_id.clone(),
                message: "routed to a name with no registered node implementation".to_string(),
            })
        })?;
        let state = state.clone();
        let ctx = NodeContext::new(node_id.clone(), step, recursion_limit, context.clone());
        let nid = node_id.clone();
        sink.emit(StreamEvent::NodeStart { node: nid.clone() });
        let handle = set.spawn(async move {
            let result = interrupt::with_resume_scope(None, || async { node.run(&state, &ctx).await }).await;
            (nid, result)
        });
        task_nodes.insert(handle.id(), node_id.clone());
    }

    let mut completed = Vec::new();
    let mut interrupted: Option<(NodeId, Value)> = None;

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((nid, Ok(partial))) => {
                sink.emit(StreamEvent::NodeEnd { node: nid.clone(), update: partial.update.clone() });
                completed.push((nid, partial));
            }
            Ok((nid, Err(NodeError::Interrupted(payload)))) => {
                debug!(node = %nid, step, outcome = "interrupt", "node suspended");
                if interrupted.is_none() {
                    interrupted = Some((nid, payload));
                }
            }
            Ok((_, Err(other))) => {
                set.abort_all();
                return Err(EngineError::Node(other));
            }
            Err(join_err) => {
                let node = task_nodes.get(&join_err.id()).cloned().unwrap_or_else(|| NodeId::new("<unknown>"));
                set.abort_all();
                return Err(EngineError::Node(NodeError::Join { node, source: join_err }));
            }
        }
    }

    // Sibling results are discarded, not cancelled: by the time `join_next`
    // drains, every task has already run to completion.
    if let Some((node, payload)) = interrupted {
        Ok(ExecOutcome::Interrupted { node, payload })
    } else {
        Ok(ExecOutcome::Completed(completed))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::control::RoutingOutcome;
    use crate::graph::GraphBuilder;
    use crate::invoke::{invoke, InvokeInput, InvokeOptions};
    use crate::node::Node;
    use crate::reducers::append;
    use crate::schema::Schema;

    struct Double;
    #[async_trait]
    impl Node for Double {
        async fn run(&self, state: &StateMap, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
            let value = state["value"].as_i64().unwrap();
            let mut update = FxHashMap::default();
            update.insert("value".to_string(), json!(value * 2));
            Ok(NodePartial::update(update))
        }
    }

    #[tokio::test]
    async fn s1_linear_doubling() {
        let schema = Schema::new().with_key("value", json!(0));
        let graph = GraphBuilder::new(schema)
            .add_node("double", Double)
            .add_edge("__start__", "double")
            .add_edge("double", "__end__")
            .compile()
            .unwrap();
        let mut update = FxHashMap::default();
        update.insert("value".to_string(), json!(5));
        let outcome = invoke(Arc::new(graph), InvokeInput::Update(update), InvokeOptions::new())
            .await
            .unwrap();
        match outcome {
            Outcome::Done { state } => assert_eq!(state["value"], json!(10)),
            _ => panic!("expected Done"),
        }
    }

    struct AppendLetter(&'static str);
    #[async_trait]
    impl Node for AppendLetter {
        async fn run(&self, _state: &StateMap, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
            let mut update = FxHashMap::default();
            update.insert("log".to_string(), json!([self.0]));
            Ok(NodePartial::update(update))
        }
    }

    #[tokio::test]
    async fn s2_reducer_controlled_concatenation() {
        let schema = Schema::new().with_reduced_key("log", json!([]), append());
        let graph = GraphBuilder::new(schema)
            .add_node("a", AppendLetter("a"))
            .add_node("b", AppendLetter("b"))
            .add_node("c", AppendLetter("c"))
            .add_sequence(["__start__", "a", "b", "c", "__end__"])
            .compile()
            .unwrap();
        let outcome = invoke(Arc::new(graph), InvokeInput::Update(FxHashMap::default()), InvokeOptions::new())
            .await
            .unwrap();
        match outcome {
            Outcome::Done { state } => assert_eq!(state["log"], json!(["a", "b", "c"])),
            _ => panic!("expected Done"),
        }
    }

    struct SetStatus(&'static str);
    #[async_trait]
    impl Node for SetStatus {
        async fn run(&self, _state: &StateMap, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
            let mut update = FxHashMap::default();
            update.insert("status".to_string(), json!(self.0));
            Ok(NodePartial::update(update))
        }
    }

    #[tokio::test]
    async fn s3_conditional_routing_with_mapping() {
        let schema = Schema::new().with_key("status", json!(""));
        let mapping: FxHashMap<String, NodeId> = [
            ("ok".to_string(), NodeId::new("pass")),
            ("error".to_string(), NodeId::new("fail")),
        ]
        .into_iter()
        .collect();
        let routing_fn: crate::graph::edges::RoutingFn = Arc::new(|state: &StateMap| {
            let status = state["status"].as_str().unwrap_or_default();
            let branch = if status == "error" { "error" } else { "ok" };
            RoutingOutcome::branch(branch)
        });
        let graph = GraphBuilder::new(schema)
            .add_node("pass", SetStatus("passed"))
            .add_node("fail", SetStatus("failed"))
            .add_edge("pass", "__end__")
            .add_edge("fail", "__end__")
            .add_conditional_edges("__start__", routing_fn, Some(mapping))
            .compile()
            .unwrap();
        let mut update = FxHashMap::default();
        update.insert("status".to_string(), json!("error"));
        let outcome = invoke(Arc::new(graph), InvokeInput::Update(update), InvokeOptions::new())
            .await
            .unwrap();
        match outcome {
            Outcome::Done { state } => assert_eq!(state["status"], json!("failed")),
            _ => panic!("expected Done"),
        }
    }

    struct Loop;
    #[async_trait]
    impl Node for Loop {
        async fn run(&self, state: &StateMap, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
            let c = state["c"].as_i64().unwrap();
            let mut update = FxHashMap::default();
            update.insert("c".to_string(), json!(c + 1));
            Ok(NodePartial::update(update))
        }
    }

    #[tokio::test]
    async fn s4_recursion_limit_breach() {
        let schema = Schema::new().with_key("c", json!(0));
        let graph = GraphBuilder::new(schema)
            .add_node("loop", Loop)
            .add_edge("__start__", "loop")
            .add_edge("loop", "loop")
            .compile()
            .unwrap();
        let result = invoke(
            Arc::new(graph),
            InvokeInput::Update(FxHashMap::default()),
            InvokeOptions::new().with_recursion_limit(5),
        )
        .await;
        match result {
            Err(EngineError::RecursionLimitExceeded { limit, step, frontier }) => {
                assert_eq!(limit, 5);
                assert_eq!(step, 5);
                assert_eq!(frontier, vec![NodeId::new("loop")]);
            }
            _ => panic!("expected RecursionLimitExceeded"),
        }
    }

    struct Track;
    #[async_trait]
    impl Node for Track {
        async fn run(&self, state: &StateMap, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
            let counter = state["counter"].as_i64().unwrap();
            let remaining = state["remaining_steps"].as_i64().unwrap();
            let mut update = FxHashMap::default();
            update.insert("counter".to_string(), json!(counter + 1));
            update.insert("seen".to_string(), json!([remaining]));
            Ok(NodePartial::update(update))
        }
    }

    #[tokio::test]
    async fn s5_managed_remaining_steps() {
        let schema = Schema::new()
            .with_key("counter", json!(0))
            .with_reduced_key("seen", json!([]), append());
        let routing_fn: crate::graph::edges::RoutingFn = Arc::new(|state: &StateMap| {
            let counter = state["counter"].as_i64().unwrap_or(0);
            if counter >= 3 {
                RoutingOutcome::names([NodeId::end()])
            } else {
                RoutingOutcome::names([NodeId::new("track")])
            }
        });
        let graph = GraphBuilder::new(schema)
            .add_node("track", Track)
            .add_edge("__start__", "track")
            .add_conditional_edges("track", routing_fn, None)
            .compile()
            .unwrap();
        let outcome = invoke(
            Arc::new(graph),
            InvokeInput::Update(FxHashMap::default()),
            InvokeOptions::new().with_recursion_limit(10),
        )
        .await
        .unwrap();
        match outcome {
            Outcome::Done { state } => {
                assert_eq!(state["counter"], json!(3));
                assert_eq!(state["seen"], json!([10, 9, 8]));
                assert!(!state.contains_key("remaining_steps"));
            }
            _ => panic!("expected Done"),
        }
    }

    struct Check;
    #[async_trait]
    impl Node for Check {
        async fn run(&self, _state: &StateMap, ctx: &NodeContext) -> Result<NodePartial, NodeError> {
            let approved = ctx.interrupt(json!("Approve value 42?")).await?;
            let mut update = FxHashMap::default();
            update.insert("approved".to_string(), approved);
            Ok(NodePartial::update(update))
        }
    }

    struct Finalize;
    #[async_trait]
    impl Node for Finalize {
        async fn run(&self, state: &StateMap, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
            let value = state["value"].as_i64().unwrap();
            let mut update = FxHashMap::default();
            update.insert("value".to_string(), json!(value * 10));
            Ok(NodePartial::update(update))
        }
    }

    #[tokio::test]
    async fn s6_interrupt_and_resume() {
        let schema = Schema::new().with_key("value", json!(0)).with_key("approved", json!(false));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let graph = Arc::new(
            GraphBuilder::new(schema)
                .with_checkpointer(store)
                .add_node("check", Check)
                .add_node("finalize", Finalize)
                .add_sequence(["__start__", "check", "finalize", "__end__"])
                .compile()
                .unwrap(),
        );

        let mut update = FxHashMap::default();
        update.insert("value".to_string(), json!(42));
        let first = invoke(
            graph.clone(),
            InvokeInput::Update(update),
            InvokeOptions::new().with_thread_id("t1"),
        )
        .await
        .unwrap();
        match first {
            Outcome::Interrupted { payload, state } => {
                assert_eq!(payload, json!("Approve value 42?"));
                assert_eq!(state["value"], json!(42));
                assert_eq!(state["approved"], json!(false));
            }
            _ => panic!("expected Interrupted"),
        }

        let second = invoke(
            graph,
            InvokeInput::Resume(json!(true)),
            InvokeOptions::new().with_thread_id("t1"),
        )
        .await
        .unwrap();
        match second {
            Outcome::Done { state } => {
                assert_eq!(state["value"], json!(420));
                assert_eq!(state["approved"], json!(true));
            }
            _ => panic!("expected Done"),
        }
    }

    struct Decide;
    #[async_trait]
    impl Node for Decide {
        async fn run(&self, state: &StateMap, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
            let value = state["value"].as_i64().unwrap();
            let mut update = FxHashMap::default();
            update.insert("value".to_string(), json!(value + 100));
            Ok(NodePartial::command(update, [NodeId::new("finish")]))
        }
    }

    struct Finish;
    #[async_trait]
    impl Node for Finish {
        async fn run(&self, _state: &StateMap, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
            let mut update = FxHashMap::default();
            update.insert("routed".to_string(), json!(true));
            Ok(NodePartial::update(update))
        }
    }

    #[tokio::test]
    async fn s7_command_routing_precedence() {
        let schema = Schema::new().with_key("value", json!(0)).with_key("routed", json!(false));
        let graph = GraphBuilder::new(schema)
            .add_node("decide", Decide)
            .add_node("finish", Finish)
            .add_edge("__start__", "decide")
            .add_edge("finish", "__end__")
            .compile()
            .unwrap();
        let mut update = FxHashMap::default();
        update.insert("value".to_string(), json!(1));
        let outcome = invoke(Arc::new(graph), InvokeInput::Update(update), InvokeOptions::new())
            .await
            .unwrap();
        match outcome {
            Outcome::Done { state } => {
                assert_eq!(state["value"], json!(101));
                assert_eq!(state["routed"], json!(true));
            }
            _ => panic!("expected Done"),
        }
    }
}
