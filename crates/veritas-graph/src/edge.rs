use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Terminal marker. Routing to it ends the run successfully.
pub const END: &str = "__end__";

/// Closed set of labels a routing predicate may return.
///
/// Implemented by plain enums; the label-to-target mapping is declared when the
/// conditional edge is registered.
pub trait RouteLabel: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    fn as_str(&self) -> &'static str;

    /// Every label the predicate can produce.
    fn variants() -> &'static [Self];
}

/// The single outgoing edge set of a node.
pub(crate) enum Edge<S> {
    /// Always taken.
    Direct(String),
    /// Predicate over the merged state selects the target.
    Conditional(Box<dyn Router<S>>),
}

impl<S> Edge<S> {
    pub(crate) fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Direct(to) => vec![to.as_str()],
            Edge::Conditional(router) => router.branches().into_iter().map(|(_, t)| t).collect(),
        }
    }
}

/// Type-erased conditional edge.
pub(crate) trait Router<S>: Send + Sync {
    /// Target for the current state, or the label that has no declared target.
    fn route(&self, state: &S) -> Result<&str, &'static str>;

    /// Declared `(label, target)` pairs in registration order.
    fn branches(&self) -> Vec<(&'static str, &str)>;

    /// Labels the predicate can return that have no target.
    fn unmapped(&self) -> Vec<&'static str>;
}

pub(crate) struct ConditionalRoute<S, L, F> {
    predicate: F,
    branches: Vec<(L, String)>,
    _state: PhantomData<fn(&S)>,
}

impl<S, L, F> ConditionalRoute<S, L, F> {
    pub(crate) fn new(predicate: F, branches: Vec<(L, String)>) -> Self {
        Self {
            predicate,
            branches,
            _state: PhantomData,
        }
    }
}

impl<S, L, F> Router<S> for ConditionalRoute<S, L, F>
where
    L: RouteLabel,
    F: Fn(&S) -> L + Send + Sync + 'static,
{
    fn route(&self, state: &S) -> Result<&str, &'static str> {
        let label = (self.predicate)(state);
        self.branches
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, target)| target.as_str())
            .ok_or_else(|| label.as_str())
    }

    fn branches(&self) -> Vec<(&'static str, &str)> {
        self.branches
            .iter()
            .map(|(l, target)| (l.as_str(), target.as_str()))
            .collect()
    }

    fn unmapped(&self) -> Vec<&'static str> {
        L::variants()
            .iter()
            .filter(|v| !self.branches.iter().any(|(l, _)| l == *v))
            .map(|v| v.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Parity {
        Even,
        Odd,
    }

    impl RouteLabel for Parity {
        fn as_str(&self) -> &'static str {
            match self {
                Parity::Even => "even",
                Parity::Odd => "odd",
            }
        }

        fn variants() -> &'static [Self] {
            &[Parity::Even, Parity::Odd]
        }
    }

    fn parity(n: &u32) -> Parity {
        if n % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    #[test]
    fn test_route_follows_mapping() {
        let route: ConditionalRoute<u32, Parity, _> = ConditionalRoute::new(
            parity,
            vec![(Parity::Even, "halve".to_string()), (Parity::Odd, "triple".to_string())],
        );
        assert_eq!(route.route(&4), Ok("halve"));
        assert_eq!(route.route(&7), Ok("triple"));
        assert!(route.unmapped().is_empty());
    }

    #[test]
    fn test_route_reports_undeclared_label() {
        let route: ConditionalRoute<u32, Parity, _> =
            ConditionalRoute::new(parity, vec![(Parity::Even, "halve".to_string())]);
        assert_eq!(route.route(&3), Err("odd"));
        assert_eq!(route.unmapped(), vec!["odd"]);
    }

    #[test]
    fn test_edge_targets() {
        let direct: Edge<u32> = Edge::Direct("next".into());
        assert_eq!(direct.targets(), vec!["next"]);

        let conditional: Edge<u32> = Edge::Conditional(Box::new(ConditionalRoute::new(
            parity,
            vec![(Parity::Even, "a".to_string()), (Parity::Odd, END.to_string())],
        )));
        assert_eq!(conditional.targets(), vec!["a", END]);
    }
}
