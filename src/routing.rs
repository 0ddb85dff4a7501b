//! The routing resolver: computes the next frontier from an executed node's
//! fixed edges, conditional-edge outcome, and explicit command gotos.

use std::collections::HashSet;

use tracing::warn;

use crate::control::{RoutingOutcome, SendOp};
use crate::error::RoutingError;
use crate::graph::CompiledGraph;
use crate::interrupt;
use crate::node::NodeContext;
use crate::state::StateSnapshot;
use crate::types::NodeId;

/// Computes the next frontier from the nodes just executed, their command
/// gotos, and the post-step state. `Send` targets are executed immediately
/// as isolated invocations and contribute nothing to the returned frontier.
pub async fn resolve_frontier(
    graph: &CompiledGraph,
    executed: &[NodeId],
    command_gotos: &[NodeId],
    post_state: &StateSnapshot,
    step: u64,
    recursion_limit: u64,
) -> Result<Vec<NodeId>, RoutingError> {
    // Command gotos precede edge-derived entries.
    let mut ordered: Vec<NodeId> = command_gotos.to_vec();

    for node in executed {
        for to in graph.fixed_edges(node) {
            ordered.push(to.clone());
        }

        if let Some(cond) = graph.conditional_edge(node) {
            let outcome = (cond.routing_fn)(post_state);
            match outcome {
                RoutingOutcome::Sends(sends) => {
                    for send in sends {
                        run_send(graph, &send, step, recursion_limit).await;
                    }
                }
                RoutingOutcome::Names(names) => {
                    for name in names {
                        if !graph.known_node(&name) {
                            return Err(RoutingError::UnknownTarget {
                                from: node.clone(),
                                to: name,
                            });
                        }
                        ordered.push(name);
                    }
                }
                RoutingOutcome::Branch(value) => {
                    let target = match &cond.mapping {
                        Some(mapping) => mapping.get(&value).cloned().ok_or_else(|| {
                            RoutingError::UnmappedBranch {
                                from: node.clone(),
                                value: value.clone(),
                            }
                        })?,
                        None => NodeId::new(value.clone()),
                    };
                    if !graph.known_node(&target) {
                        return Err(RoutingError::UnknownTarget {
                            from: node.clone(),
                            to: target,
                        });
                    }
                    ordered.push(target);
                }
            }
        }
    }

    Ok(dedup_preserving_order(ordered))
}

/// Runs a `Send` target as an isolated node invocation with its own state
/// payload. The result is intentionally discarded (see DESIGN.md). Failures
/// are logged, not propagated: a discarded side-effecting fan-out failing
/// must not fail the main-line super-step.
async fn run_send(graph: &CompiledGraph, send: &SendOp, step: u64, recursion_limit: u64) {
    let Some(node) = graph.node(&send.node) else {
        warn!(node = %send.node, "Send targeted an unknown node; dropping");
        return;
    };
    let ctx = NodeContext::new(send.node.clone(), step, recursion_limit, None);
    let result = interrupt::with_resume_scope(None, || async { node.run(&send.state, &ctx).await }).await;
    if let Err(err) = result {
        warn!(node = %send.node, error = %err, "Send fan-out invocation failed; discarding");
    }
}

fn dedup_preserving_order(items: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|n| seen.insert(n.clone())).collect()
}
