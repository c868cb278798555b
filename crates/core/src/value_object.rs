//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new value; shared snapshots (e.g. a resolved permission matrix) are
/// replaced wholesale rather than mutated in place.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
