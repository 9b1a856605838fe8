use crate::bounding_volume::Aabb;

/// Errors reported by the operations modifying a [`Bvh`](super::Bvh).
///
/// Every operation returning one of these errors leaves the tree untouched.
#[derive(thiserror::Error, Copy, Clone, Debug, PartialEq)]
pub enum BvhError {
    /// The leaf identifier isn’t part of the tree.
    #[error("no leaf with identifier {leaf} exists in this BVH")]
    NodeNotFound {
        /// The identifier that was looked up.
        leaf: u32,
    },
    /// The leaf identifier is already part of the tree.
    #[error("a leaf with identifier {leaf} already exists in this BVH")]
    DuplicateLeaf {
        /// The identifier that was inserted twice.
        leaf: u32,
    },
    /// The leaf identifier is the sentinel value used internally for missing leaves.
    #[error("the leaf identifier {leaf} is reserved")]
    ReservedLeafId {
        /// The rejected identifier.
        leaf: u32,
    },
    /// The leaf identifier given to a bulk build doesn’t fit in a `u32`.
    #[error("the leaf identifier {leaf} doesn’t fit in 32 bits")]
    LeafIdOutOfRange {
        /// The rejected identifier.
        leaf: usize,
    },
    /// The leaf bounds contain non-finite values or have `mins > maxs` on some axis.
    #[error("the leaf {leaf} has non-finite or inverted bounds: {aabb:?}")]
    DegenerateBounds {
        /// The identifier of the rejected leaf.
        leaf: u32,
        /// The rejected bounds.
        aabb: Aabb,
    },
}
