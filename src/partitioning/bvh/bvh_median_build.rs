use super::bvh_tree::check_leaf;
use super::{Bvh, BvhBuildStrategy, BvhError, BvhNode, BvhWorkspace};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::Real;

/// Ranges with at least this many leaves have their bounds computed in parallel.
#[cfg(feature = "parallel")]
const PARALLEL_BOUNDS_THRESHOLD: usize = 4096;

/// A range of leaves waiting to be turned into a subtree by the top-down builder.
#[derive(Copy, Clone, Debug)]
pub(super) struct BvhBuildItem {
    start: usize,
    end: usize,
    parent: u32,
    side: usize,
}

impl Bvh {
    /// Creates a new BVH with a slice of AABBs.
    ///
    /// Each leaf will be associated an index equal to its position into the slice. For example,
    /// the AABB `leaves[42]` is associated to the leaf identifier `42`.
    ///
    /// # Errors
    ///
    /// Returns [`BvhError::DegenerateBounds`] if any AABB isn’t valid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sdf_bvh3d::bounding_volume::Aabb;
    /// use sdf_bvh3d::partitioning::{Bvh, BvhBuildStrategy};
    /// use nalgebra::Point3;
    ///
    /// let aabbs: Vec<_> = (0..8)
    ///     .map(|i| {
    ///         let x = i as f32 * 2.0;
    ///         Aabb::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0))
    ///     })
    ///     .collect();
    /// let bvh = Bvh::from_leaves(BvhBuildStrategy::Midpoint, &aabbs).unwrap();
    ///
    /// assert_eq!(bvh.max_height(), 3);
    /// assert_eq!(bvh.node_count(), 15);
    /// ```
    pub fn from_leaves(strategy: BvhBuildStrategy, leaves: &[Aabb]) -> Result<Self, BvhError> {
        Self::from_iter(strategy, leaves.iter().copied().enumerate())
    }

    /// Creates a new BVH with leaves given by an iterator.
    ///
    /// The iterator yields leaf identifiers and AABBs. The leaf identifiers will then be read
    /// back by various methods like tree traversals or leaf iterations.
    ///
    /// Note that the identifiers are stored internally as `u32`. The iterator expects `usize`
    /// for convenience (so that iterators built with `.enumerate()` can be used directly
    /// without an additional cast of the `usize` index to `u32`).
    ///
    /// # Errors
    ///
    /// - [`BvhError::DuplicateLeaf`] if the same identifier is yielded twice.
    /// - [`BvhError::DegenerateBounds`] if any AABB isn’t valid.
    /// - [`BvhError::ReservedLeafId`] if an identifier is [`BvhNode::NONE`].
    /// - [`BvhError::LeafIdOutOfRange`] if an identifier doesn’t fit in a `u32`.
    pub fn from_iter<It>(strategy: BvhBuildStrategy, leaves: It) -> Result<Self, BvhError>
    where
        It: IntoIterator<Item = (usize, Aabb)>,
    {
        let leaves = leaves.into_iter();
        let (capacity_lo, capacity_up) = leaves.size_hint();
        let capacity = capacity_up.unwrap_or(capacity_lo);

        let mut result = Self::with_capacity(capacity);
        let mut workspace = BvhWorkspace::default();
        workspace.build_leaves.reserve(capacity);

        for (leaf_id, leaf_aabb) in leaves {
            let leaf_id = u32::try_from(leaf_id)
                .map_err(|_| BvhError::LeafIdOutOfRange { leaf: leaf_id })?;
            check_leaf(leaf_id, &leaf_aabb)?;

            // The actual node index is set by the build.
            if result
                .leaf_node_indices
                .insert(leaf_id, BvhNode::NONE)
                .is_some()
            {
                return Err(BvhError::DuplicateLeaf { leaf: leaf_id });
            }

            workspace.build_leaves.push((leaf_id, leaf_aabb));
        }

        result.build_from_workspace(&mut workspace, strategy);
        Ok(result)
    }

    /// Fully rebuilds this BVH using the given strategy.
    ///
    /// This rebuilds a BVH with the same leaves, but different intermediate nodes and depth
    /// using the specified building strategy. The arena is compacted in the process, so every
    /// node index previously returned by [`Bvh::insert`] is invalidated.
    pub fn rebuild(&mut self, workspace: &mut BvhWorkspace, strategy: BvhBuildStrategy) {
        workspace.build_leaves.clear();
        workspace.build_leaves.extend(
            self.leaf_node_indices
                .iter()
                .map(|(leaf_data, node)| (*leaf_data, self.nodes[*node as usize].aabb)),
        );
        // Makes the result independent from the hash map’s iteration order.
        workspace.build_leaves.sort_unstable_by_key(|(leaf_data, _)| *leaf_data);

        self.nodes.clear();
        self.free_list.clear();
        self.root = BvhNode::NONE;
        self.build_from_workspace(workspace, strategy);
    }

    /// Builds the tree from the leaves in `workspace.build_leaves`.
    ///
    /// `self` must not contain any node. Nodes are allocated top-down, so a single pass in
    /// reverse allocation order is enough to compute the AABBs and heights of internal nodes.
    fn build_from_workspace(&mut self, workspace: &mut BvhWorkspace, strategy: BvhBuildStrategy) {
        debug_assert!(self.nodes.is_empty() && self.root == BvhNode::NONE);

        let leaves = &mut workspace.build_leaves;
        let stack = &mut workspace.build_stack;

        if leaves.is_empty() {
            return;
        }

        stack.clear();
        stack.push(BvhBuildItem {
            start: 0,
            end: leaves.len(),
            parent: BvhNode::NONE,
            side: BvhNode::LEFT,
        });

        while let Some(item) = stack.pop() {
            let id = if item.end - item.start == 1 {
                let (leaf_data, aabb) = leaves[item.start];
                let id = self.alloc_node(BvhNode::leaf(aabb, leaf_data));
                let _ = self.leaf_node_indices.insert(leaf_data, id);
                id
            } else {
                let id = self.alloc_node(BvhNode::placeholder());
                let mid = item.start + split_range(&mut leaves[item.start..item.end], strategy);
                stack.push(BvhBuildItem {
                    start: mid,
                    end: item.end,
                    parent: id,
                    side: BvhNode::RIGHT,
                });
                stack.push(BvhBuildItem {
                    start: item.start,
                    end: mid,
                    parent: id,
                    side: BvhNode::LEFT,
                });
                id
            };

            if item.parent == BvhNode::NONE {
                self.root = id;
            } else {
                self.nodes[item.parent as usize].children[item.side] = id;
                self.nodes[id as usize].parent = item.parent;
            }
        }

        for id in (0..self.nodes.len() as u32).rev() {
            if !self.nodes[id as usize].is_leaf() {
                self.refresh_node(id);
            }
        }

        log::debug!(
            "Built BVH with {} leaves ({:?} split): height {}, cost {}.",
            leaves.len(),
            strategy,
            self.max_height(),
            self.calculate_cost()
        );
    }
}

/// Reorders `leaves` so that the two halves `[0, mid)` and `[mid, len)` become the two
/// children subtrees, and returns `mid`.
///
/// `leaves` must contain at least two elements. The returned value is always in `1..len`.
fn split_range(leaves: &mut [(u32, Aabb)], strategy: BvhBuildStrategy) -> usize {
    debug_assert!(leaves.len() > 1);

    let bounds = range_bounds(leaves);
    let axis = bounds.widest_axis();

    match strategy {
        BvhBuildStrategy::Midpoint => {
            let split = bounds.center()[axis];
            let mid = partition(leaves, axis, split);

            if is_balanced_split(leaves.len(), mid) {
                mid
            } else {
                log::trace!(
                    "Lopsided midpoint split ({} of {} leaves) along axis {}, splitting by count.",
                    mid,
                    leaves.len(),
                    axis
                );
                median_split(leaves, axis)
            }
        }
        BvhBuildStrategy::Median => median_split(leaves, axis),
    }
}

/// Moves the `len / 2` leaves with the smallest centers along `axis` to the front of the slice,
/// and returns `len / 2`.
fn median_split(leaves: &mut [(u32, Aabb)], axis: usize) -> usize {
    let mid = leaves.len() / 2;
    let _ = leaves.select_nth_unstable_by(mid, |a, b| {
        a.1.center()[axis].total_cmp(&b.1.center()[axis])
    });
    mid
}

/// Height of the subtree built from `len` leaves when every range is split with
/// [`is_balanced_split`], i.e., `⌈log2(len)⌉`.
fn optimal_height(len: usize) -> u32 {
    debug_assert!(len > 0);
    usize::BITS - (len - 1).leading_zeros()
}

/// Can a range of `len` leaves be split at `mid` without breaking the height balance?
///
/// Both sides must have a height of at most `⌈log2(len)⌉ - 1`, and their heights must differ by
/// at most one. Ranges split this way always produce trees of height `⌈log2(len)⌉` where every
/// internal node is balanced.
fn is_balanced_split(len: usize, mid: usize) -> bool {
    if mid == 0 || mid == len {
        return false;
    }

    let max_height = optimal_height(len) - 1;
    let left = optimal_height(mid);
    let right = optimal_height(len - mid);
    left <= max_height && right <= max_height && left.abs_diff(right) <= 1
}

/// Hoare partition: moves every leaf with a center strictly below `split` along `axis` to the
/// front of the slice, and returns the number of such leaves.
fn partition(leaves: &mut [(u32, Aabb)], axis: usize, split: Real) -> usize {
    let is_left = |leaf: &(u32, Aabb)| leaf.1.center()[axis] < split;
    let mut i = 0;
    let mut j = leaves.len();

    loop {
        while i < j && is_left(&leaves[i]) {
            i += 1;
        }

        while i < j && !is_left(&leaves[j - 1]) {
            j -= 1;
        }

        if i >= j {
            return i;
        }

        leaves.swap(i, j - 1);
        i += 1;
        j -= 1;
    }
}

#[cfg(not(feature = "parallel"))]
fn range_bounds(leaves: &[(u32, Aabb)]) -> Aabb {
    leaves
        .iter()
        .fold(Aabb::new_invalid(), |acc, leaf| acc.merged(&leaf.1))
}

#[cfg(feature = "parallel")]
fn range_bounds(leaves: &[(u32, Aabb)]) -> Aabb {
    use rayon::prelude::*;

    if leaves.len() >= PARALLEL_BOUNDS_THRESHOLD {
        leaves
            .par_iter()
            .map(|leaf| leaf.1)
            .reduce(Aabb::new_invalid, |a, b| a.merged(&b))
    } else {
        leaves
            .iter()
            .fold(Aabb::new_invalid(), |acc, leaf| acc.merged(&leaf.1))
    }
}
