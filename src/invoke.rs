//! The invocation entry point. Resolves a graph, an input (a plain update or
//! a resume command), and an options bag into a running super-step engine
//! invocation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::checkpoint::CheckpointConfig;
use crate::config::EngineConfig;
use crate::engine;
use crate::error::{EngineError, EngineResult};
use crate::graph::CompiledGraph;
use crate::node::InvokeContext;
use crate::routing;
use crate::state::{apply_update, StateUpdate};
use crate::stream::{EventSink, EventStream};
use crate::types::NodeId;

pub use crate::engine::Outcome;

/// Either a plain partial update merged into the base state, or a resume
/// command carrying the value a prior `interrupt` call is waiting on.
#[derive(Debug, Clone)]
pub enum InvokeInput {
    Update(StateUpdate),
    Resume(Value),
}

/// Per-call overrides layered on top of the graph's checkpoint store and
/// default [`EngineConfig`].
#[derive(Clone, Default)]
pub struct InvokeOptions {
    recursion_limit: Option<u64>,
    checkpoint: CheckpointConfig,
    context: Option<InvokeContext>,
    stream_idle_timeout: Option<Duration>,
}

impl InvokeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_recursion_limit(mut self, limit: u64) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.checkpoint = CheckpointConfig::for_thread(thread_id);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: InvokeContext) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = Some(timeout);
        self
    }
}

/// Runs `input` against `graph` to completion, suspension, or a fatal error.
/// Resolves a resume command against the latest interrupted checkpoint, or
/// merges a plain update into base state for a fresh run.
pub async fn invoke(graph: Arc<CompiledGraph>, input: InvokeInput, options: InvokeOptions) -> EngineResult<Outcome> {
    run_invocation(graph, input, options, EventSink::none()).await
}

/// Like [`invoke`], but returns a lazily-consumed [`EventStream`] instead of
/// awaiting the final outcome. The invocation runs to completion in a
/// background task regardless of whether the stream is fully consumed.
pub async fn stream(graph: Arc<CompiledGraph>, input: InvokeInput, options: InvokeOptions) -> EventStream {
    let idle_timeout = options
        .stream_idle_timeout
        .unwrap_or_else(|| EngineConfig::default().stream_idle_timeout());

    let (tx, rx) = mpsc::unbounded_channel();
    let sink = EventSink::new(tx);
    let error_sink = sink.clone();

    tokio::spawn(async move {
        if let Err(err) = run_invocation(graph, input, options, sink).await {
            error_sink.emit(crate::stream::StreamEvent::Done(crate::stream::DoneEvent::Error {
                reason: err.to_string(),
            }));
        }
    });

    EventStream::new(rx, idle_timeout)
}

async fn run_invocation(
    graph: Arc<CompiledGraph>,
    input: InvokeInput,
    options: InvokeOptions,
    sink: EventSink,
) -> EngineResult<Outcome> {
    let recursion_limit = options
        .recursion_limit
        .unwrap_or_else(|| EngineConfig::default().recursion_limit());
    let thread_id = options.checkpoint.thread_id.clone();

    match input {
        InvokeInput::Resume(value) => {
            let tid = thread_id.ok_or_else(|| EngineError::NoPendingInterrupt { thread_id: String::new() })?;
            let store = graph
                .checkpointer()
                .ok_or_else(|| EngineError::NoPendingInterrupt { thread_id: tid.clone() })?;
            let cfg = CheckpointConfig::for_thread(tid.clone());
            let checkpoint = store
                .load(&cfg)
                .await?
                .ok_or_else(|| EngineError::NoPendingInterrupt { thread_id: tid.clone() })?;
            let mut pending = checkpoint.pending_interrupts.unwrap_or_default();
            if pending.is_empty() {
                return Err(EngineError::NoPendingInterrupt { thread_id: tid });
            }
            let head = pending.remove(0);

            engine::run(
                graph,
                checkpoint.state,
                vec![head.node.clone()],
                checkpoint.step,
                recursion_limit,
                Some(tid),
                options.context,
                Some((head.node, value)),
                sink,
            )
            .await
        }
        InvokeInput::Update(update) => {
            let base_state = match (graph.checkpointer(), thread_id.as_ref()) {
                (Some(store), Some(tid)) => {
                    let cfg = CheckpointConfig::for_thread(tid.clone());
                    match store.load(&cfg).await? {
                        Some(checkpoint)
                            if checkpoint
                                .pending_interrupts
                                .as_ref()
                                .map(Vec::is_empty)
                                .unwrap_or(true) =>
                        {
                            checkpoint.state
                        }
                        _ => graph.initial_state().clone(),
                    }
                }
                _ => graph.initial_state().clone(),
            };

            let merged = apply_update(&base_state, &update, graph.reducers());
            let start_frontier =
                routing::resolve_frontier(&graph, &[NodeId::start()], &[], &merged, 0, recursion_limit).await?;

            engine::run(
                graph,
                merged,
                start_frontier,
                0,
                recursion_limit,
                thread_id,
                options.context,
                None,
                sink,
            )
            .await
        }
    }
}
