//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Implemented by every persisted record of the assignment graph so stores can
/// key them uniformly.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Ord + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
