use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use veritas_core::error::{Result, VeritasError};

use crate::edge::{ConditionalRoute, Edge, RouteLabel, END};
use crate::executor::CompiledGraph;
use crate::node::Node;
use crate::state::GraphState;

/// Builder for a graph over state `S`.
///
/// Nodes are registered by name; each node gets exactly one outgoing edge set,
/// either a direct edge or a group of conditional edges. [`StateGraph::compile`]
/// checks the wiring and produces an executable [`CompiledGraph`].
pub struct StateGraph<S: GraphState> {
    nodes: HashMap<String, Box<dyn Node<S>>>,
    /// Registration order, for deterministic validation and rendering.
    order: Vec<String>,
    edges: HashMap<String, Edge<S>>,
    entry: Option<String>,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: HashMap::new(),
            entry: None,
        }
    }

    /// Register a node under its own name.
    pub fn add_node<N: Node<S>>(&mut self, node: N) -> Result<&mut Self> {
        let name = node.name().to_string();
        if name.is_empty() || name == END {
            return Err(VeritasError::GraphValidation(format!(
                "invalid node name '{}'",
                name
            )));
        }
        if self.nodes.contains_key(&name) {
            return Err(VeritasError::DuplicateNode(name));
        }
        self.order.push(name.clone());
        self.nodes.insert(name, Box::new(node));
        Ok(self)
    }

    /// Unconditional edge `from -> to`. `to` may be [`END`].
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<&mut Self> {
        self.claim_source(from)?;
        self.edges
            .insert(from.to_string(), Edge::Direct(to.to_string()));
        Ok(self)
    }

    /// Conditional edges out of `from`: after `from` runs, `predicate` picks a label
    /// and execution continues at the target mapped to it.
    pub fn add_conditional_edges<'t, L, F, I>(
        &mut self,
        from: &str,
        predicate: F,
        branches: I,
    ) -> Result<&mut Self>
    where
        L: RouteLabel,
        F: Fn(&S) -> L + Send + Sync + 'static,
        I: IntoIterator<Item = (L, &'t str)>,
    {
        let mut mapped: Vec<(L, String)> = Vec::new();
        for (label, target) in branches {
            if mapped.iter().any(|(l, _)| *l == label) {
                return Err(VeritasError::GraphValidation(format!(
                    "label '{}' mapped twice on edges out of '{}'",
                    label.as_str(),
                    from
                )));
            }
            mapped.push((label, target.to_string()));
        }
        if mapped.is_empty() {
            return Err(VeritasError::GraphValidation(format!(
                "conditional edges out of '{}' declare no targets",
                from
            )));
        }

        self.claim_source(from)?;
        self.edges.insert(
            from.to_string(),
            Edge::Conditional(Box::new(ConditionalRoute::new(predicate, mapped))),
        );
        Ok(self)
    }

    pub fn set_entry_point(&mut self, name: &str) -> Result<&mut Self> {
        if name == END {
            return Err(VeritasError::GraphValidation(
                "the terminal marker cannot be the entry point".into(),
            ));
        }
        self.entry = Some(name.to_string());
        Ok(self)
    }

    /// A node may own a single outgoing edge set.
    fn claim_source(&self, from: &str) -> Result<()> {
        if from == END {
            return Err(VeritasError::GraphValidation(
                "the terminal marker cannot have outgoing edges".into(),
            ));
        }
        if self.edges.contains_key(from) {
            return Err(VeritasError::EdgeConflict(from.to_string()));
        }
        Ok(())
    }

    /// Validate the wiring and freeze the graph.
    pub fn compile(self) -> Result<CompiledGraph<S>> {
        let entry = self
            .entry
            .clone()
            .ok_or_else(|| VeritasError::GraphValidation("no entry point set".into()))?;
        if !self.nodes.contains_key(&entry) {
            return Err(VeritasError::NodeNotFound(entry));
        }

        let mut sources: Vec<&String> = self.edges.keys().collect();
        sources.sort();
        for from in sources {
            if !self.nodes.contains_key(from) {
                return Err(VeritasError::GraphValidation(format!(
                    "edge declared from unregistered node '{}'",
                    from
                )));
            }
            for target in self.edges[from].targets() {
                if target != END && !self.nodes.contains_key(target) {
                    return Err(VeritasError::GraphValidation(format!(
                        "edge {} -> {} targets an unregistered node",
                        from, target
                    )));
                }
            }
        }

        for name in &self.order {
            if !self.edges.contains_key(name) {
                return Err(VeritasError::GraphValidation(format!(
                    "node '{}' has no outgoing edge",
                    name
                )));
            }
        }

        let can_finish = self.reaches_end();
        if let Some(stuck) = self.order.iter().find(|n| !can_finish.contains(n.as_str())) {
            return Err(VeritasError::GraphValidation(format!(
                "node '{}' has no path to {}",
                stuck, END
            )));
        }

        let reachable = self.reachable_from(&entry);
        for name in self.order.iter().filter(|n| !reachable.contains(n.as_str())) {
            warn!(node = %name, "Node is unreachable from the entry point");
        }

        for name in &self.order {
            if let Some(Edge::Conditional(router)) = self.edges.get(name) {
                let unmapped = router.unmapped();
                if !unmapped.is_empty() {
                    warn!(
                        node = %name,
                        labels = ?unmapped,
                        "Route labels without a target will fail at runtime"
                    );
                }
            }
        }

        debug!(nodes = self.order.len(), entry = %entry, "Graph compiled");
        Ok(CompiledGraph::new(self.nodes, self.order, self.edges, entry))
    }

    /// Nodes with a path to END (reverse breadth-first search).
    fn reaches_end(&self) -> HashSet<&str> {
        let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, edge) in &self.edges {
            for target in edge.targets() {
                incoming.entry(target).or_default().push(from.as_str());
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([END]);
        while let Some(node) = queue.pop_front() {
            for &pred in incoming.get(node).map(Vec::as_slice).unwrap_or_default() {
                if seen.insert(pred) {
                    queue.push_back(pred);
                }
            }
        }
        seen
    }

    fn reachable_from<'a>(&'a self, entry: &'a str) -> HashSet<&'a str> {
        let mut seen: HashSet<&str> = HashSet::from([entry]);
        let mut queue: VecDeque<&str> = VecDeque::from([entry]);
        while let Some(node) = queue.pop_front() {
            if let Some(edge) = self.edges.get(node) {
                for target in edge.targets() {
                    if target != END && seen.insert(target) {
                        queue.push_back(target);
                    }
                }
            }
        }
        seen
    }
}
