//! Conditional edges: a routing function plus an optional branch-value
//! mapping, as consumed by the routing resolver.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::control::RoutingOutcome;
use crate::state::StateSnapshot;
use crate::types::NodeId;

pub type RoutingFn = Arc<dyn Fn(&StateSnapshot) -> RoutingOutcome + Send + Sync>;

#[derive(Clone)]
pub struct ConditionalEdge {
    pub from: NodeId,
    pub routing_fn: RoutingFn,
    pub mapping: Option<FxHashMap<String, NodeId>>,
}

impl fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("from", &self.from)
            .field("mapping", &self.mapping)
            .finish()
    }
}
