//! Graph construction and the frozen, executable graph it produces.

pub mod builder;
pub mod compiled;
pub mod edges;

pub use builder::GraphBuilder;
pub use compiled::CompiledGraph;
pub use edges::ConditionalEdge;
