use std::any::Any;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use veritas_core::error::{Result, VeritasError};

use crate::edge::{Edge, END};
use crate::node::{Node, NodeFailure};
use crate::state::GraphState;

/// Steps allowed per run before the executor gives up.
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

/// Result of executing a single node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeResult {
    /// Which node was executed.
    pub node: String,
    /// Whether the node returned an update rather than a failure.
    pub succeeded: bool,
    /// Execution time in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of executing an entire graph.
#[derive(Debug, Clone)]
pub struct ExecutionResult<S> {
    /// Final merged state.
    pub state: S,
    /// Per-node results in execution order.
    pub node_results: Vec<NodeResult>,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
    /// Whether every executed node succeeded.
    pub succeeded: bool,
}

impl<S> ExecutionResult<S> {
    /// Node names in visit order.
    pub fn path(&self) -> Vec<&str> {
        self.node_results.iter().map(|r| r.node.as_str()).collect()
    }
}

/// A validated graph, ready to run.
///
/// Execution is strictly sequential: each node is awaited to completion, its
/// update merged, and only then is the outgoing edge evaluated against the
/// merged state.
pub struct CompiledGraph<S: GraphState> {
    nodes: HashMap<String, Box<dyn Node<S>>>,
    order: Vec<String>,
    edges: HashMap<String, Edge<S>>,
    entry: String,
    recursion_limit: usize,
}

impl<S: GraphState> CompiledGraph<S> {
    pub(crate) fn new(
        nodes: HashMap<String, Box<dyn Node<S>>>,
        order: Vec<String>,
        edges: HashMap<String, Edge<S>>,
        entry: String,
    ) -> Self {
        Self {
            nodes,
            order,
            edges,
            entry,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Maximum node executions per run.
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Node names in registration order.
    pub fn node_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Run to completion and return the final state.
    pub async fn invoke(&self, initial: S) -> Result<S> {
        self.run(initial).await.map(|r| r.state)
    }

    /// Run to completion, recording per-node results.
    ///
    /// Node failures and panics are folded into the state and the run continues.
    /// Wiring errors (an undeclared route label, a missing node, exceeding the
    /// recursion limit) abort the run.
    pub async fn run(&self, initial: S) -> Result<ExecutionResult<S>> {
        let start = Instant::now();
        let mut state = initial;
        let mut node_results = Vec::new();
        let mut current = self.entry.clone();

        while current != END {
            if node_results.len() >= self.recursion_limit {
                error!(
                    node = %current,
                    limit = self.recursion_limit,
                    "Recursion limit reached, aborting graph"
                );
                return Err(VeritasError::RecursionLimit(self.recursion_limit));
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| VeritasError::NodeNotFound(current.clone()))?;

            info!(node = %current, step = node_results.len() + 1, "Executing graph node");

            let node_start = Instant::now();
            let outcome = AssertUnwindSafe(async { node.run(&state).await })
                .catch_unwind()
                .await;

            let (update, succeeded) = match outcome {
                Ok(Ok(update)) => (update, true),
                Ok(Err(failure)) => {
                    warn!(node = %current, step = %failure.step, error = %failure.message, "Graph node failed");
                    (S::failure_update(failure), false)
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(node = %current, error = %message, "Graph node panicked");
                    let failure = NodeFailure::new(
                        format!("{}_failed", current),
                        format!("Node '{}' panicked: {}", current, message),
                    );
                    (S::failure_update(failure), false)
                }
            };
            state.merge(update);

            let elapsed_ms = node_start.elapsed().as_millis() as u64;
            debug!(node = %current, succeeded, elapsed_ms, "Node execution complete");
            node_results.push(NodeResult {
                node: current.clone(),
                succeeded,
                elapsed_ms,
            });

            let next = match self.edges.get(&current) {
                Some(Edge::Direct(to)) => to.clone(),
                Some(Edge::Conditional(router)) => match router.route(&state) {
                    Ok(to) => to.to_string(),
                    Err(label) => {
                        error!(node = %current, label, "Route label has no declared target");
                        return Err(VeritasError::UndeclaredRoute {
                            node: current,
                            label: label.to_string(),
                        });
                    }
                },
                None => {
                    return Err(VeritasError::GraphValidation(format!(
                        "node '{}' has no outgoing edge",
                        current
                    )))
                }
            };
            debug!(from = %current, to = %next, "Following edge");
            current = next;
        }

        let total_elapsed_ms = start.elapsed().as_millis() as u64;
        let succeeded = node_results.iter().all(|r| r.succeeded);
        info!(steps = node_results.len(), total_elapsed_ms, succeeded, "Graph complete");

        Ok(ExecutionResult {
            state,
            node_results,
            total_elapsed_ms,
            succeeded,
        })
    }

    /// Mermaid flowchart of the graph.
    pub fn describe(&self) -> String {
        let mut out = String::from("graph TD\n");
        let _ = writeln!(out, "    __start__([start]) --> {}", self.entry);
        for name in &self.order {
            match self.edges.get(name) {
                Some(Edge::Direct(to)) => {
                    let _ = writeln!(out, "    {} --> {}", name, mermaid_id(to));
                }
                Some(Edge::Conditional(router)) => {
                    for (label, to) in router.branches() {
                        let _ = writeln!(out, "    {} -. {} .-> {}", name, label, mermaid_id(to));
                    }
                }
                None => {}
            }
        }
        out
    }
}

fn mermaid_id(name: &str) -> String {
    if name == END {
        format!("{}([end])", END)
    } else {
        name.to_string()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
