use super::bvh_tree::check_leaf;
use super::{Bvh, BvhError, BvhNode, BvhWorkspace};
use crate::bounding_volume::Aabb;

impl Bvh {
    /// Recomputes the AABB and height of every internal node from its children.
    ///
    /// The tree topology isn’t modified: this is only meant to propagate leaf motions
    /// applied with [`Bvh::set_leaf_aabb_partially`] (or [`Bvh::refit_with`]) to the ancestors.
    /// Children are always refreshed before their parent, so a single `O(n)` pass is enough.
    /// Refitting an already up-to-date tree doesn’t change anything.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sdf_bvh3d::bounding_volume::Aabb;
    /// use sdf_bvh3d::partitioning::{Bvh, BvhWorkspace};
    /// use nalgebra::Point3;
    ///
    /// let mut bvh = Bvh::new();
    /// let mut workspace = BvhWorkspace::default();
    ///
    /// for i in 0..10 {
    ///     let x = i as f32 * 2.0;
    ///     let aabb = Aabb::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0));
    ///     bvh.insert(aabb, i).unwrap();
    /// }
    ///
    /// // Move every leaf by a small amount, then fix the ancestors in one pass.
    /// for i in 0..10 {
    ///     let x = i as f32 * 2.0 + 0.5;
    ///     let aabb = Aabb::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0));
    ///     bvh.set_leaf_aabb_partially(i, aabb).unwrap();
    /// }
    /// bvh.refit(&mut workspace);
    ///
    /// assert_eq!(bvh.root_aabb().unwrap().maxs, Point3::new(19.5, 1.0, 1.0));
    /// ```
    pub fn refit(&mut self, workspace: &mut BvhWorkspace) {
        if self.is_empty() {
            return;
        }

        self.collect_top_down_order(workspace);

        for &id in workspace.top_down_order.iter().rev() {
            if !self.nodes[id as usize].is_leaf() {
                self.refresh_node(id);
            }
        }

        log::trace!(
            "Refitted {} nodes, tree height: {}.",
            workspace.top_down_order.len(),
            self.max_height()
        );
    }

    /// Overwrites the AABB of every leaf with the one given by `leaf_aabb`, then refits the tree.
    ///
    /// `leaf_aabb` is called once per leaf with the leaf identifier given at insertion time.
    ///
    /// # Errors
    ///
    /// Returns [`BvhError::DegenerateBounds`] if any of the new AABBs isn’t valid. All the new
    /// AABBs are checked before the first one is written, so the tree is left untouched in
    /// that case.
    pub fn refit_with(
        &mut self,
        workspace: &mut BvhWorkspace,
        leaf_aabb: impl Fn(u32) -> Aabb,
    ) -> Result<(), BvhError> {
        workspace.refit_leaves.clear();

        for (&leaf_data, &node) in self.leaf_node_indices.iter() {
            let aabb = leaf_aabb(leaf_data);
            check_leaf(leaf_data, &aabb)?;
            workspace.refit_leaves.push((node, aabb));
        }

        for &(node, aabb) in &workspace.refit_leaves {
            self.nodes[node as usize].aabb = aabb;
        }

        self.refit(workspace);
        Ok(())
    }

    /// Replaces the AABB of a leaf without updating its ancestors.
    ///
    /// The tree isn’t valid anymore until [`Bvh::refit`] is called. This is useful to move
    /// many leaves by small amounts and then propagate all the changes in a single pass.
    ///
    /// # Errors
    ///
    /// - [`BvhError::NodeNotFound`] if there is no leaf with this identifier.
    /// - [`BvhError::DegenerateBounds`] if `aabb` isn’t valid.
    pub fn set_leaf_aabb_partially(&mut self, leaf_data: u32, aabb: Aabb) -> Result<(), BvhError> {
        check_leaf(leaf_data, &aabb)?;
        let node = self
            .leaf_node_indices
            .get(&leaf_data)
            .ok_or(BvhError::NodeNotFound { leaf: leaf_data })?;
        self.nodes[*node as usize].aabb = aabb;
        Ok(())
    }

    /// Fills `workspace.top_down_order` with every reachable node, each parent appearing
    /// before its children.
    pub(super) fn collect_top_down_order(&self, workspace: &mut BvhWorkspace) {
        workspace.top_down_order.clear();
        workspace.stack.clear();

        if let Some(root) = self.root() {
            workspace.stack.push(root);
        }

        while let Some(id) = workspace.stack.pop() {
            workspace.top_down_order.push(id);
            let node = &self.nodes[id as usize];

            if !node.is_leaf() {
                workspace.stack.push(node.children[BvhNode::RIGHT]);
                workspace.stack.push(node.children[BvhNode::LEFT]);
            }
        }
    }
}
