//! The mutable draft that accumulates nodes and edges before
//! [`GraphBuilder::compile`] freezes it into a [`super::compiled::CompiledGraph`].

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::compiled::CompiledGraph;
use super::edges::{ConditionalEdge, RoutingFn};
use crate::checkpoint::CheckpointStore;
use crate::error::BuildError;
use crate::node::Node;
use crate::schema::Schema;
use crate::types::NodeId;

/// Fluent draft of a graph. Every `with_*`/`add_*` method consumes and
/// returns `self` so call sites read as a single chained expression.
pub struct GraphBuilder {
    schema: Schema,
    nodes: FxHashMap<NodeId, Arc<dyn Node>>,
    edges: FxHashMap<NodeId, Vec<NodeId>>,
    conditional_edges: FxHashMap<NodeId, ConditionalEdge>,
    checkpointer: Option<Arc<dyn CheckpointStore>>,
    errors: Vec<BuildError>,
}

impl GraphBuilder {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            conditional_edges: FxHashMap::default(),
            checkpointer: None,
            errors: Vec::new(),
        }
    }

    /// Attaches the checkpoint store the compiled graph will persist to.
    #[must_use]
    pub fn with_checkpointer(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpointer = Some(store);
        self
    }

    #[must_use]
    pub fn add_node(mut self, name: impl Into<NodeId>, node: impl Node + 'static) -> Self {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            self.errors.push(BuildError::DuplicateNode(name));
        } else {
            self.nodes.insert(name, Arc::new(node));
        }
        self
    }

    /// Registers a compiled subgraph as a node.
    #[must_use]
    pub fn add_subgraph(self, name: impl Into<NodeId>, subgraph: Arc<CompiledGraph>) -> Self {
        self.add_node(name, super::compiled::SubgraphNode::new(subgraph))
    }

    /// Appends `to` to `from`'s outgoing fixed-edge list, preserving
    /// insertion order.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }

    /// Sugar for pairwise [`Self::add_edge`] across a chain of node names.
    #[must_use]
    pub fn add_sequence<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        let names: Vec<NodeId> = names.into_iter().map(Into::into).collect();
        for pair in names.windows(2) {
            self.edges.entry(pair[0].clone()).or_default().push(pair[1].clone());
        }
        self
    }

    #[must_use]
    pub fn add_conditional_edges(
        mut self,
        from: impl Into<NodeId>,
        routing_fn: RoutingFn,
        mapping: Option<FxHashMap<String, NodeId>>,
    ) -> Self {
        let from = from.into();
        self.conditional_edges.insert(
            from.clone(),
            ConditionalEdge { from, routing_fn, mapping },
        );
        self
    }

    /// Validates the draft and freezes it into an immutable, shareable
    /// [`CompiledGraph`]. All validation failures are fatal and reported
    /// together.
    pub fn compile(mut self) -> Result<CompiledGraph, Vec<BuildError>> {
        let start = NodeId::start();

        let has_start_edge =
            self.edges.get(&start).is_some_and(|v| !v.is_empty()) || self.conditional_edges.contains_key(&start);
        if !has_start_edge {
            self.errors.push(BuildError::NoStartEdge);
        }

        for (from, targets) in &self.edges {
            for to in targets {
                let is_defined = to.is_end() || self.nodes.contains_key(to);
                if !is_defined {
                    self.errors.push(BuildError::UndefinedTarget {
                        from: from.clone(),
                        to: to.clone(),
                    });
                }
            }
        }

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        let (initial, reducers) = self.schema.parse();
        Ok(CompiledGraph::new(
            initial,
            reducers,
            self.nodes,
            self.edges,
            self.conditional_edges,
            self.checkpointer,
        ))
    }
}
