use super::bvh_traverse::TRAVERSAL_STACK_SIZE;
use super::{Bvh, BvhNode};
use core::fmt;
use smallvec::SmallVec;

/// Displays a [`Bvh`] as an indented tree, one node per line.
///
/// Created by [`Bvh::debug_tree`].
pub struct BvhDebugTree<'a> {
    tree: &'a Bvh,
}

impl Bvh {
    /// Returns an object that formats this tree as indented text.
    ///
    /// Each line shows the arena index of a node, its height, its AABB and, for leaves, their
    /// identifier. Children are indented by two spaces relative to their parent, left child
    /// first.
    ///
    /// ```rust
    /// use sdf_bvh3d::bounding_volume::Aabb;
    /// use sdf_bvh3d::partitioning::Bvh;
    /// use nalgebra::Point3;
    ///
    /// let mut bvh = Bvh::new();
    /// bvh.insert(Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0)), 7).unwrap();
    /// assert_eq!(
    ///     bvh.debug_tree().to_string(),
    ///     "#0 leaf 7 [0, 0, 0] -> [1, 1, 1]\n"
    /// );
    /// ```
    pub fn debug_tree(&self) -> BvhDebugTree<'_> {
        BvhDebugTree { tree: self }
    }
}

impl fmt::Display for BvhDebugTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(root) = self.tree.root() else {
            return writeln!(f, "<empty>");
        };

        let mut stack: SmallVec<[(u32, usize); TRAVERSAL_STACK_SIZE]> = SmallVec::new();
        stack.push((root, 0));

        while let Some((id, depth)) = stack.pop() {
            let node = &self.tree.nodes[id as usize];
            let (mins, maxs) = (node.aabb.mins, node.aabb.maxs);
            write!(f, "{:indent$}#{}", "", id, indent = depth * 2)?;

            if node.is_leaf() {
                write!(f, " leaf {}", node.leaf_data)?;
            } else {
                write!(f, " h={}", node.height)?;
            }

            writeln!(
                f,
                " [{}, {}, {}] -> [{}, {}, {}]",
                mins.x, mins.y, mins.z, maxs.x, maxs.y, maxs.z
            )?;

            if !node.is_leaf() {
                stack.push((node.children[BvhNode::RIGHT], depth + 1));
                stack.push((node.children[BvhNode::LEFT], depth + 1));
            }
        }

        Ok(())
    }
}
