use std::fmt;
use std::marker::PhantomData;

use futures::future::BoxFuture;

use crate::state::GraphState;

/// What a node returns: its update on success, or a structured failure.
pub type NodeOutput<U> = std::result::Result<U, NodeFailure<U>>;

/// A recoverable node failure.
///
/// `step` is the failed-phase label recorded as the current step, `message` the
/// explanatory error string, and `update` any partial results worth keeping.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure<U> {
    pub step: String,
    pub message: String,
    pub update: U,
}

impl<U: Default> NodeFailure<U> {
    pub fn new(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            message: message.into(),
            update: U::default(),
        }
    }

    /// Attach partial results to the failure.
    pub fn with_update(mut self, update: U) -> Self {
        self.update = update;
        self
    }
}

impl<U> fmt::Display for NodeFailure<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.message)
    }
}

/// A named unit of work in a graph.
///
/// Nodes read the current state and return a partial update. Expected failures
/// (network errors, empty inputs, malformed responses) are reported as a
/// [`NodeFailure`], never as a panic.
pub trait Node<S: GraphState>: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn run<'a>(&'a self, state: &'a S) -> BoxFuture<'a, NodeOutput<S::Update>>;
}

/// Node backed by a synchronous closure.
pub struct FnNode<S, F> {
    name: String,
    func: F,
    _state: PhantomData<fn(&S)>,
}

impl<S, F> FnNode<S, F>
where
    S: GraphState,
    F: Fn(&S) -> NodeOutput<S::Update> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _state: PhantomData,
        }
    }
}

impl<S, F> Node<S> for FnNode<S, F>
where
    S: GraphState,
    F: Fn(&S) -> NodeOutput<S::Update> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, state: &'a S) -> BoxFuture<'a, NodeOutput<S::Update>> {
        Box::pin(async move { (self.func)(state) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    impl GraphState for Counter {
        type Update = Option<u32>;

        fn merge(&mut self, update: Option<u32>) {
            if let Some(n) = update {
                self.0 = n;
            }
        }

        fn failure_update(failure: NodeFailure<Option<u32>>) -> Option<u32> {
            failure.update
        }
    }

    #[test]
    fn test_failure_builder() {
        let failure: NodeFailure<Option<u32>> =
            NodeFailure::new("search_failed", "Search failed: timeout").with_update(Some(3));
        assert_eq!(failure.step, "search_failed");
        assert_eq!(failure.update, Some(3));
        assert_eq!(failure.to_string(), "search_failed: Search failed: timeout");
    }

    #[tokio::test]
    async fn test_fn_node_runs_closure() {
        let node = FnNode::<Counter, _>::new("inc", |s: &Counter| Ok(Some(s.0 + 1)));
        assert_eq!(node.name(), "inc");
        let out = node.run(&Counter(41)).await;
        assert_eq!(out, Ok(Some(42)));
    }
}
