use super::{BvhError, BvhNode};
use crate::bounding_volume::Aabb;
use crate::partitioning::Bvh;

impl Bvh {
    /// Deletes the leaf with the given identifier and returns its AABB.
    ///
    /// The sibling of the removed leaf takes the place of their common parent, then the
    /// ancestors are rebalanced the same way as after an insertion. The operation is `O(h)`
    /// where `h` is the tree height.
    ///
    /// # Errors
    ///
    /// Returns [`BvhError::NodeNotFound`] (and leaves the tree untouched) if no leaf with this
    /// identifier exists.
    pub fn remove(&mut self, leaf_data: u32) -> Result<Aabb, BvhError> {
        let leaf = self
            .leaf_node_indices
            .remove(&leaf_data)
            .ok_or(BvhError::NodeNotFound { leaf: leaf_data })?;
        let aabb = self.nodes[leaf as usize].aabb;

        if leaf == self.root {
            // We deleted the last leaf.
            debug_assert!(self.leaf_node_indices.is_empty());
            self.clear();
            return Ok(aabb);
        }

        let parent = self.nodes[leaf as usize].parent;
        let parent_node = &self.nodes[parent as usize];
        let sibling = if parent_node.children[BvhNode::LEFT] == leaf {
            parent_node.children[BvhNode::RIGHT]
        } else {
            parent_node.children[BvhNode::LEFT]
        };
        let grandparent = parent_node.parent;

        self.replace_child(grandparent, parent, sibling);
        self.free_node(parent);
        self.free_node(leaf);

        self.rebalance_ancestors(grandparent);
        Ok(aabb)
    }
}
