//! The streaming facade: exposes an invocation as a lazy sequence of events.

use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::state::{StateSnapshot, StateUpdate};
use crate::types::NodeId;

/// One event pushed by the engine during an invocation.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    StepStart { step: u64, active: Vec<NodeId> },
    NodeStart { node: NodeId },
    NodeEnd { node: NodeId, update: StateUpdate },
    StepEnd { step: u64, state: StateSnapshot },
    Done(DoneEvent),
}

/// The terminal event a stream always ends with (barring an idle timeout).
#[derive(Debug, Clone)]
pub enum DoneEvent {
    Ok { state: StateSnapshot },
    Interrupt { payload: Value, state: StateSnapshot },
    Error { reason: String },
}

/// Engine-side handle for pushing events to an (optional) consumer. Cloned
/// and held by the engine for the lifetime of one invocation; dropping every
/// clone closes the stream, which is how a cancelled consumer stops the
/// producer's intent to keep emitting (the engine itself still runs to
/// completion in the background).
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: Option<mpsc::UnboundedSender<StreamEvent>>,
}

impl EventSink {
    pub(crate) fn none() -> Self {
        Self { tx: None }
    }

    pub(crate) fn new(tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub(crate) fn emit(&self, event: StreamEvent) {
        if let Some(tx) = &self.tx {
            // A closed receiver (consumer dropped the stream) is not an
            // engine error: the engine keeps running, it just has no one
            // listening anymore.
            let _ = tx.send(event);
        }
    }
}

/// A lazy, single-consumer, finite sequence of [`StreamEvent`]s produced by
/// one invocation. Cannot be restarted.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    idle_timeout: Duration,
    last_state: StateSnapshot,
    timed_out: bool,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<StreamEvent>, idle_timeout: Duration) -> Self {
        Self {
            rx,
            idle_timeout,
            last_state: StateSnapshot::default(),
            timed_out: false,
        }
    }

    /// Pulls the next event, or `None` once the stream has ended (either the
    /// engine emitted `Done` and closed the channel, or the idle timeout
    /// elapsed and a synthetic `Done` with the last-seen state was already
    /// returned on the previous call).
    pub async fn next(&mut self) -> Option<StreamEvent> {
        if self.timed_out {
            return None;
        }
        match tokio::time::timeout(self.idle_timeout, self.rx.recv()).await {
            Ok(Some(event)) => {
                if let StreamEvent::StepEnd { state, .. } = &event {
                    self.last_state = state.clone();
                }
                Some(event)
            }
            Ok(None) => None,
            Err(_elapsed) => {
                self.timed_out = true;
                Some(StreamEvent::Done(DoneEvent::Ok { state: self.last_state.clone() }))
            }
        }
    }

    /// Adapts this into a boxed `futures_util` stream, for callers composing
    /// with combinators (e.g. an SSE endpoint) instead of polling `next`
    /// directly.
    pub fn into_stream(self) -> BoxStream<'static, StreamEvent> {
        stream::unfold(self, |mut this| async move { this.next().await.map(|event| (event, this)) }).boxed()
    }
}
