//! # loomgraph: a stateful, multi-step agent-workflow execution engine
//!
//! loomgraph runs a compiled graph of async nodes through a BSP/Pregel-style
//! super-step loop: a frontier of node names is executed each step, their
//! partial updates are folded into a shared state through per-key reducers,
//! and routing (fixed edges, conditional edges, explicit `goto` commands)
//! determines the next frontier until `__end__` is reached or a node
//! cooperatively suspends the invocation with [`interrupt::interrupt`].
//!
//! ## Quick start
//!
//! ```
//! use loomgraph::graph::GraphBuilder;
//! use loomgraph::node::{Node, NodeContext};
//! use loomgraph::control::NodePartial;
//! use loomgraph::error::NodeError;
//! use loomgraph::schema::Schema;
//! use loomgraph::state::StateSnapshot;
//! use loomgraph::invoke::{invoke, InvokeInput, InvokeOptions, Outcome};
//! use async_trait::async_trait;
//! use rustc_hash::FxHashMap;
//! use serde_json::json;
//!
//! struct Double;
//!
//! #[async_trait]
//! impl Node for Double {
//!     async fn run(&self, state: &StateSnapshot, _ctx: &NodeContext) -> Result<NodePartial, NodeError> {
//!         let value = state.get("value").and_then(|v| v.as_i64()).unwrap_or(0);
//!         let mut update = FxHashMap::default();
//!         update.insert("value".to_string(), json!(value * 2));
//!         Ok(NodePartial::update(update))
//!     }
//! }
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let schema = Schema::new().with_key("value", json!(0));
//! let graph = GraphBuilder::new(schema)
//!     .add_node("double", Double)
//!     .add_edge("__start__", "double")
//!     .add_edge("double", "__end__")
//!     .compile()
//!     .expect("graph compiles");
//!
//! let mut update = FxHashMap::default();
//! update.insert("value".to_string(), json!(5));
//! let outcome = invoke(
//!     std::sync::Arc::new(graph),
//!     InvokeInput::Update(update),
//!     InvokeOptions::new(),
//! )
//! .await
//! .expect("invocation succeeds");
//!
//! match outcome {
//!     Outcome::Done { state } => assert_eq!(state["value"], json!(10)),
//!     Outcome::Interrupted { .. } => panic!("unexpected interrupt"),
//! }
//! # });
//! ```
//!
//! ## Module guide
//!
//! - [`schema`] / [`state`] / [`reducers`] - state schema, the running state
//!   map, and per-key merge functions.
//! - [`graph`] - the mutable builder and the frozen compiled graph it
//!   produces.
//! - [`interrupt`] - the cooperative suspension channel.
//! - [`routing`] - next-frontier resolution.
//! - [`engine`] - the super-step loop.
//! - [`checkpoint`] - the checkpoint store contract and its two built-in
//!   backends.
//! - [`stream`] - the streaming event facade.
//! - [`invoke`] - the public invocation entry point.
//! - [`telemetry`] / [`config`] - ambient logging and runtime configuration.
//! - [`error`] - the crate-wide error taxonomy.

pub mod checkpoint;
pub mod config;
pub mod control;
mod engine;
pub mod error;
pub mod graph;
pub mod interrupt;
pub mod invoke;
pub mod node;
pub mod reducers;
pub mod routing;
pub mod schema;
pub mod state;
pub mod stream;
pub mod telemetry;
pub mod types;
