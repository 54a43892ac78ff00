use crate::node::NodeFailure;

/// How a field's update combines with the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Most recent value wins; an absent update leaves the field unchanged.
    Replace,
    /// Updates are appended in application order; nothing is ever removed.
    Accumulate,
}

/// One entry of a partial-update schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub policy: MergePolicy,
}

/// Merge behaviour of an update slot, selected by the slot's type.
///
/// `Option<T>` replaces a `T`, `Vec<T>` accumulates into a `Vec<T>`.
pub trait Reducer<T> {
    const POLICY: MergePolicy;

    fn reduce_into(self, target: &mut T);

    /// True when applying this slot would leave the target untouched.
    fn is_unset(&self) -> bool;
}

impl<T> Reducer<T> for Option<T> {
    const POLICY: MergePolicy = MergePolicy::Replace;

    fn reduce_into(self, target: &mut T) {
        if let Some(value) = self {
            *target = value;
        }
    }

    fn is_unset(&self) -> bool {
        self.is_none()
    }
}

impl<T> Reducer<Vec<T>> for Vec<T> {
    const POLICY: MergePolicy = MergePolicy::Accumulate;

    fn reduce_into(self, target: &mut Vec<T>) {
        target.extend(self);
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// State threaded through a graph.
pub trait GraphState: Send + Sync + 'static {
    /// Sparse update returned by nodes. `Default` is the empty update.
    type Update: Default + Send + 'static;

    fn merge(&mut self, update: Self::Update);

    /// Fold a node failure (step label, message, partial results) into an update.
    fn failure_update(failure: NodeFailure<Self::Update>) -> Self::Update;
}

/// Declare the partial-update type of a state record.
///
/// Each field names its merge policy once: `replace T` becomes an `Option<T>` slot,
/// `accumulate T` a `Vec<T>` slot that is appended to a `Vec<T>` state field. The
/// macro generates the update struct (deriving `Default`), a `SCHEMA` constant, and
/// `apply_to`, which merges every slot into the state field of the same name.
///
/// ```
/// use veritas_graph::{state_update, MergePolicy};
///
/// pub struct Log {
///     pub label: String,
///     pub lines: Vec<String>,
/// }
///
/// state_update! {
///     #[derive(Debug, Clone)]
///     pub struct LogUpdate for Log {
///         label: replace String,
///         lines: accumulate String,
///     }
/// }
///
/// let mut log = Log { label: "a".into(), lines: vec!["x".into()] };
/// LogUpdate { label: None, lines: vec!["y".into()] }.apply_to(&mut log);
/// assert_eq!(log.label, "a");
/// assert_eq!(log.lines, vec!["x", "y"]);
/// assert_eq!(LogUpdate::SCHEMA[1].policy, MergePolicy::Accumulate);
/// ```
#[macro_export]
macro_rules! state_update {
    (@slot replace $ty:ty) => { ::std::option::Option<$ty> };
    (@slot accumulate $ty:ty) => { ::std::vec::Vec<$ty> };
    (@policy replace) => { $crate::MergePolicy::Replace };
    (@policy accumulate) => { $crate::MergePolicy::Accumulate };
    (
        $(#[$meta:meta])*
        $vis:vis struct $update:ident for $state:ty {
            $( $(#[$fmeta:meta])* $field:ident : $policy:ident $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Default)]
        $vis struct $update {
            $( $(#[$fmeta])* pub $field: $crate::state_update!(@slot $policy $ty), )*
        }

        impl $update {
            pub const SCHEMA: &'static [$crate::FieldSchema] = &[
                $( $crate::FieldSchema {
                    name: stringify!($field),
                    policy: $crate::state_update!(@policy $policy),
                }, )*
            ];

            /// Merge every slot into `state` according to its declared policy.
            pub fn apply_to(self, state: &mut $state) {
                $( $crate::Reducer::reduce_into(self.$field, &mut state.$field); )*
            }

            /// True when the update would not change any field.
            pub fn is_empty(&self) -> bool {
                true $( && $crate::Reducer::is_unset(&self.$field) )*
            }
        }
    };
}
