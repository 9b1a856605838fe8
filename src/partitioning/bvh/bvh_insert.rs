use super::bvh_traverse::TRAVERSAL_STACK_SIZE;
use super::bvh_tree::check_leaf;
use super::{BvhError, BvhNode};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::Real;
use crate::partitioning::Bvh;
use smallvec::SmallVec;

const MAX_SIBLING_HEIGHT: u32 = 1;

impl Bvh {
    /// Inserts a new leaf into this BVH.
    ///
    /// The leaf is paired with the sibling that minimizes the surface-area cost of the tree,
    /// then the ancestors of the new leaf are rebalanced with AVL-style rotations.
    ///
    /// Returns the arena index of the new leaf node. This index remains valid until the leaf
    /// is removed or the tree is rebuilt.
    ///
    /// # Errors
    ///
    /// - [`BvhError::DuplicateLeaf`] if `leaf_data` is already part of the tree.
    /// - [`BvhError::DegenerateBounds`] if `aabb` isn’t finite or is inverted.
    /// - [`BvhError::ReservedLeafId`] if `leaf_data` is [`BvhNode::NONE`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use sdf_bvh3d::bounding_volume::Aabb;
    /// use sdf_bvh3d::partitioning::Bvh;
    /// use nalgebra::Point3;
    ///
    /// let mut bvh = Bvh::new();
    /// for (i, x) in [0.0, 5.0, 10.0].into_iter().enumerate() {
    ///     let aabb = Aabb::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0));
    ///     bvh.insert(aabb, i as u32).unwrap();
    /// }
    ///
    /// assert_eq!(bvh.node_count(), 5);
    /// assert_eq!(bvh.root_aabb().unwrap().maxs, Point3::new(11.0, 1.0, 1.0));
    /// ```
    pub fn insert(&mut self, aabb: Aabb, leaf_data: u32) -> Result<u32, BvhError> {
        check_leaf(leaf_data, &aabb)?;

        if self.leaf_node_indices.contains_key(&leaf_data) {
            return Err(BvhError::DuplicateLeaf { leaf: leaf_data });
        }

        Ok(self.insert_unchecked(aabb, leaf_data))
    }

    /// Moves an existing leaf by removing it and inserting it again with the new bounds.
    ///
    /// The tree is only modified if `aabb` is valid and `leaf_data` exists. Returns the new
    /// arena index of the leaf node.
    pub fn update_bounds(&mut self, aabb: Aabb, leaf_data: u32) -> Result<u32, BvhError> {
        check_leaf(leaf_data, &aabb)?;
        let _ = self.remove(leaf_data)?;
        Ok(self.insert_unchecked(aabb, leaf_data))
    }

    /// Inserts a new leaf into this BVH without checking if it already exists.
    pub(super) fn insert_unchecked(&mut self, aabb: Aabb, leaf_data: u32) -> u32 {
        let leaf = self.alloc_node(BvhNode::leaf(aabb, leaf_data));
        let _ = self.leaf_node_indices.insert(leaf_data, leaf);

        // If the tree is empty, the leaf becomes the root.
        if self.root == BvhNode::NONE {
            self.root = leaf;
            return leaf;
        }

        let sibling = self.find_best_sibling(&aabb);
        let sibling_node = self.nodes[sibling as usize];
        let old_parent = sibling_node.parent;

        let mut new_parent = BvhNode::placeholder();
        new_parent.aabb = sibling_node.aabb.merged(&aabb);
        new_parent.children = [sibling, leaf];
        new_parent.height = sibling_node.height + 1;
        let new_parent = self.alloc_node(new_parent);

        self.replace_child(old_parent, sibling, new_parent);
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        self.rebalance_ancestors(old_parent);
        leaf
    }

    /// Finds the node that, once paired with a new leaf bounded by `aabb`, results in the
    /// smallest increase of the tree’s surface-area cost.
    ///
    /// This is a branch-and-bound search. The cost of pairing with a node is the area of the
    /// merged box, plus the area added to all its ancestors (the inherited cost). Since the
    /// merged box of any descendant is at least as large as `aabb`, a subtree is skipped as
    /// soon as `aabb.half_area()` plus its inherited cost can’t beat the best candidate.
    ///
    /// Only nodes with a height of at most 1 are candidates. This keeps the new parent
    /// balanced so that single rotations along the ancestors are enough to restore the
    /// height balance of the whole tree.
    fn find_best_sibling(&self, aabb: &Aabb) -> u32 {
        let new_area = aabb.half_area();
        let mut best_sibling = self.root;
        let mut best_cost = Real::MAX;
        let mut stack: SmallVec<[(u32, Real); TRAVERSAL_STACK_SIZE]> = SmallVec::new();
        stack.push((self.root, 0.0));

        while let Some((id, inherited_cost)) = stack.pop() {
            let node = &self.nodes[id as usize];
            let direct_cost = node.aabb.merged(aabb).half_area();
            let cost = direct_cost + inherited_cost;

            if cost < best_cost && node.height <= MAX_SIBLING_HEIGHT {
                best_cost = cost;
                best_sibling = id;
            }

            if node.is_leaf() {
                continue;
            }

            let child_inherited_cost = inherited_cost + direct_cost - node.aabb.half_area();
            let lower_bound_cost = new_area + child_inherited_cost;

            if lower_bound_cost < best_cost {
                stack.push((node.children[BvhNode::LEFT], child_inherited_cost));
                stack.push((node.children[BvhNode::RIGHT], child_inherited_cost));
            }
        }

        best_sibling
    }
}
