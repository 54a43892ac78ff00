//! Typed-state graph executor.
//!
//! A graph is a set of named [`Node`]s over a shared state `S`. Each node reads the
//! state and returns a partial update; the executor merges the update according to
//! the per-field policies declared with [`state_update!`], then follows the node's
//! single outgoing edge set (direct, or conditional on a [`RouteLabel`]) until it
//! reaches [`END`].

pub mod builder;
pub mod edge;
pub mod executor;
pub mod node;
pub mod state;

pub use builder::StateGraph;
pub use edge::{RouteLabel, END};
pub use executor::{CompiledGraph, ExecutionResult, NodeResult, DEFAULT_RECURSION_LIMIT};
pub use node::{FnNode, Node, NodeFailure, NodeOutput};
pub use state::{FieldSchema, GraphState, MergePolicy, Reducer};
