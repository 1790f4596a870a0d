//! Value object trait: equality by value, not identity.
//!
//! Quantities, plan lines and divergence tags are value objects: two of them with
//! the same attributes are interchangeable. Entities (received items, inspection
//! items) are not, they are addressed by their line number.

/// Marker trait for immutable, value-compared domain objects.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Color(String);
///
/// impl ValueObject for Color {}
///
/// assert_eq!(Color("black".into()), Color("black".into()));
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
