//! Ambient runtime configuration, resolved from builder calls layered with
//! environment overrides.
//!
//! The checkpoint store is deliberately not configured here: it is a
//! property of the compiled graph (see [`crate::graph::builder::GraphBuilder::with_checkpointer`]),
//! not of a per-invocation config object.

use std::time::Duration;

const DEFAULT_RECURSION_LIMIT: u64 = 25;
const DEFAULT_STREAM_IDLE_TIMEOUT_MS: u64 = 5_000;

/// Per-invocation configuration: the recursion limit and stream idle timeout.
#[derive(Clone)]
pub struct EngineConfig {
    recursion_limit: u64,
    stream_idle_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        dotenvy::dotenv().ok();

        let recursion_limit = std::env::var("LOOMGRAPH_RECURSION_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RECURSION_LIMIT);

        let stream_idle_timeout_ms = std::env::var("LOOMGRAPH_STREAM_IDLE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_MS);

        Self {
            recursion_limit,
            stream_idle_timeout: Duration::from_millis(stream_idle_timeout_ms),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_recursion_limit(mut self, limit: u64) -> Self {
        self.recursion_limit = limit;
        self
    }

    #[must_use]
    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub fn recursion_limit(&self) -> u64 {
        self.recursion_limit
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        self.stream_idle_timeout
    }
}
