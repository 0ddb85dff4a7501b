//! Crate-wide error taxonomy.
//!
//! Every fatal outcome surfaces as a variant of [`EngineError`]. Leaf enums
//! carry the detail for a single concern (build-time validation, routing,
//! node execution, checkpoint I/O) and convert into `EngineError` via
//! `#[from]`, so callers that only care about the top-level taxonomy can
//! match on one type.

use miette::Diagnostic;
use thiserror::Error;

use crate::types::NodeId;

/// Errors raised while assembling a [`crate::graph::GraphBuilder`] into a
/// [`crate::graph::CompiledGraph`].
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("`__start__` has no outgoing edge")]
    #[diagnostic(
        code(loomgraph::build::no_start_edge),
        help("add at least one `add_edge`/`add_conditional_edges` call from `__start__`")
    )]
    NoStartEdge,

    #[error("edge from `{from}` targets undefined node `{to}`")]
    #[diagnostic(code(loomgraph::build::undefined_target))]
    UndefinedTarget { from: NodeId, to: NodeId },

    #[error("node `{0}` was registered more than once")]
    #[diagnostic(code(loomgraph::build::duplicate_node))]
    DuplicateNode(NodeId),
}

/// Errors raised by the routing resolver while computing the next frontier.
#[derive(Debug, Error, Diagnostic)]
pub enum RoutingError {
    #[error("conditional routing from `{from}` returned `{value}`, which has no entry in its mapping")]
    #[diagnostic(
        code(loomgraph::routing::unmapped_branch),
        help("add `{value}` to the mapping passed to add_conditional_edges, or route on raw names without a mapping")
    )]
    UnmappedBranch { from: NodeId, value: String },

    #[error("conditional routing from `{from}` targets undefined node `{to}`")]
    #[diagnostic(code(loomgraph::routing::unknown_target))]
    UnknownTarget { from: NodeId, to: NodeId },
}

/// Errors raised while running a single node body.
///
/// [`NodeError::Interrupted`] is not a failure from the engine's point of
/// view: it is the `?`-propagated control-flow signal a node body uses to
/// cooperatively suspend. The engine special-cases this variant and never
/// logs it at `error` level.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    #[error("node `{node}` failed: {message}")]
    #[diagnostic(code(loomgraph::node::failed))]
    Failed { node: NodeId, message: String },

    #[error("node suspended with a payload awaiting resume")]
    #[diagnostic(code(loomgraph::node::interrupted))]
    Interrupted(serde_json::Value),

    #[error("node `{node}` task panicked or was cancelled: {source}")]
    #[diagnostic(code(loomgraph::node::join_error))]
    Join {
        node: NodeId,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error(
        "subgraph node `{node}` interrupted; subgraph interrupts are not propagated to the parent invocation"
    )]
    #[diagnostic(
        code(loomgraph::node::subgraph_interrupt_swallowed),
        help("this mirrors the upstream behavior documented as an open question in DESIGN.md")
    )]
    SubgraphInterruptSwallowed { node: NodeId },

    #[error("value for key `{key}` could not be serialized: {source}")]
    #[diagnostic(code(loomgraph::node::serde))]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by a [`crate::checkpoint::CheckpointStore`] implementation.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointError {
    #[error("checkpoint config is missing required key `thread_id`")]
    #[diagnostic(code(loomgraph::checkpoint::missing_thread_id))]
    MissingThreadId,

    #[error("checkpoint backend failure: {0}")]
    #[diagnostic(code(loomgraph::checkpoint::backend))]
    Backend(String),

    #[cfg(feature = "checkpoint-sqlite")]
    #[error("sqlite checkpoint backend error: {0}")]
    #[diagnostic(code(loomgraph::checkpoint::sqlite))]
    Sqlite(#[from] sqlx::Error),
}

/// Top-level error type returned by [`crate::invoke::invoke`] and
/// [`crate::invoke::stream`].
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("recursion limit {limit} exceeded at step {step} with frontier {frontier:?}")]
    #[diagnostic(
        code(loomgraph::engine::recursion_limit),
        help("raise `recursion_limit` and re-invoke from the last checkpoint if this is expected")
    )]
    RecursionLimitExceeded {
        limit: u64,
        step: u64,
        frontier: Vec<NodeId>,
    },

    #[error("resume command issued for thread `{thread_id}` with no pending interrupt")]
    #[diagnostic(
        code(loomgraph::engine::no_pending_interrupt),
        help("a thread can only be resumed once per interrupt; issuing the same resume twice is an error")
    )]
    NoPendingInterrupt { thread_id: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
