//! Structural equality (`fn:deep-equal`).
//!
//! Comparison never fails: values of incomparable types are unequal, NaN is
//! equal to itself, and nodes are compared by structure with comments and
//! processing instructions ignored in content.
mod deep_equal;

pub use deep_equal::{atomic_deep_equal, deep_equal, deep_equal_items, node_deep_equal};
