//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and defined entirely by their attribute
/// values: `Account { code: "1000", .. }` is a value object, a customer with
/// an id is an entity. To "modify" a value object, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
