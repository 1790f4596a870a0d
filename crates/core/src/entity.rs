//! Entity trait: identity that survives state changes.
//!
//! Used for the children owned by an aggregate (received items, inspection
//! items) which are addressed by a line number inside their parent.

use crate::error::DomainError;

pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

/// 1-based line number for the child appended after `existing` lines.
pub fn next_line_no(existing: usize) -> Result<u32, DomainError> {
    u32::try_from(existing)
        .ok()
        .and_then(|n| n.checked_add(1))
        .ok_or_else(|| DomainError::invariant(format!("line limit reached after {existing} lines")))
}
