//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Spare parts, ledger entries and users all carry a stable identifier that
/// stores index rows by.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
