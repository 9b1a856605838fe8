use super::{Bvh, BvhNode};
use crate::bounding_volume::BoundingVolume;
use crate::math::Real;
use crate::utils::hashset::HashSet;
use alloc::vec::Vec;

impl Bvh {
    /// The surface-area cost of this tree: the sum of the half-areas of all its internal nodes.
    ///
    /// Lower is better. This only measures the quality of the tree, any value is valid.
    /// Returns 0 for an empty tree or a tree with a single leaf.
    pub fn calculate_cost(&self) -> Real {
        let mut cost = 0.0;
        self.for_each_reachable(|_, node| {
            if !node.is_leaf() {
                cost += node.aabb.half_area();
            }
        });
        cost
    }

    /// Counts the number of nodes that can be reached from the root.
    ///
    /// For a well-formed tree, this is equal to [`Bvh::node_count`].
    pub fn reachable_node_count(&self) -> usize {
        let mut count = 0;
        self.for_each_reachable(|_, _| count += 1);
        count
    }

    /// The identifiers of all the leaves, in depth-first order (left children first).
    pub fn depth_first_leaves(&self) -> Vec<u32> {
        self.leaves(|_| true).collect()
    }

    fn for_each_reachable(&self, mut f: impl FnMut(u32, &BvhNode)) {
        let mut stack = Self::traversal_stack();

        if let Some(root) = self.root() {
            stack.push(root);
        }

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            f(id, node);

            if !node.is_leaf() {
                stack.push(node.children[BvhNode::RIGHT]);
                stack.push(node.children[BvhNode::LEFT]);
            }
        }
    }

    /// Panics if the tree isn’t well-formed.
    ///
    /// The tree is well-formed if it is topologically correct (parent and child links agree,
    /// no loops, no dangling leaf map entry), geometrically correct (the AABB of a parent
    /// bounds the ones of its children) and if the node heights and the live node count are
    /// consistent.
    pub fn assert_well_formed(&self) {
        let Some(root) = self.root() else {
            assert!(self.leaf_node_indices.is_empty());
            assert_eq!(self.node_count(), 0);
            return;
        };

        assert_eq!(self.nodes[root as usize].parent, BvhNode::NONE);

        let mut loop_detection = HashSet::new();
        let leaf_count = self.assert_well_formed_recurse(root, &mut loop_detection);

        assert_eq!(leaf_count, self.leaf_count());
        assert_eq!(loop_detection.len(), 2 * leaf_count as usize - 1);
        assert_eq!(loop_detection.len(), self.node_count());

        for id in &self.free_list {
            assert!(
                !loop_detection.contains(id),
                "Node {} is both free and reachable.",
                id
            );
        }
    }

    fn assert_well_formed_recurse(&self, node_id: u32, loop_detection: &mut HashSet<u32>) -> u32 {
        let node = &self.nodes[node_id as usize];

        if !loop_detection.insert(node_id) {
            panic!("Detected loop. Node {} visited twice.", node_id);
        }

        if node.is_leaf() {
            assert_eq!(node.height, 0);
            assert_eq!(node.children, [BvhNode::NONE; 2]);
            assert_eq!(
                self.leaf_node_indices.get(&node.leaf_data),
                Some(&node_id),
                "Leaf {} isn’t mapped to node {}.",
                node.leaf_data,
                node_id
            );
            return 1;
        }

        let mut leaf_count = 0;

        for child_id in node.children {
            assert_ne!(child_id, BvhNode::NONE);
            let child = &self.nodes[child_id as usize];
            assert_eq!(child.parent, node_id);
            assert!(node.aabb.contains(&child.aabb));
            leaf_count += self.assert_well_formed_recurse(child_id, loop_detection);
        }

        let [left, right] = node.children;
        let left = &self.nodes[left as usize];
        let right = &self.nodes[right as usize];
        assert_eq!(node.height, 1 + left.height.max(right.height));
        assert_eq!(node.aabb, left.aabb.merged(&right.aabb));

        leaf_count
    }

    /// Panics if the heights of the two children of any internal node differ by more than 1.
    pub fn assert_balanced(&self) {
        self.for_each_reachable(|id, node| {
            if !node.is_leaf() {
                let [left, right] = node.children;
                let left = self.nodes[left as usize].height as i64;
                let right = self.nodes[right as usize].height as i64;
                assert!(
                    (right - left).abs() <= 1,
                    "Node {} is unbalanced: left height {}, right height {}.",
                    id,
                    left,
                    right
                );
            }
        });
    }
}
