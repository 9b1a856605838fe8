use super::BvhNode;
use crate::partitioning::Bvh;

impl Bvh {
    /// Walks from `node_id` up to the root, rotating every unbalanced node and refreshing the
    /// AABBs and heights of the others.
    ///
    /// Does nothing if `node_id` is [`BvhNode::NONE`].
    pub(super) fn rebalance_ancestors(&mut self, mut node_id: u32) {
        while node_id != BvhNode::NONE {
            let subtree_root = self.balance(node_id);
            node_id = self.nodes[subtree_root as usize].parent;
        }
    }

    /// Applies a rotation at `node_id` if the heights of its children differ by more than one.
    ///
    /// The AABB and height of every modified node are recomputed. Returns the index of the node
    /// now at the root of this subtree.
    fn balance(&mut self, node_id: u32) -> u32 {
        let [left, right] = self.nodes[node_id as usize].children;
        let balance =
            self.nodes[right as usize].height as i64 - self.nodes[left as usize].height as i64;

        if balance > 1 {
            self.rotate_up(node_id, BvhNode::RIGHT)
        } else if balance < -1 {
            self.rotate_up(node_id, BvhNode::LEFT)
        } else {
            self.refresh_node(node_id);
            node_id
        }
    }

    /// Promotes the child of `node_id` on the given `side` so it takes the place of `node_id`.
    ///
    /// The promoted child keeps its tallest child, while its shortest child is handed over to
    /// `node_id` in place of the promoted child. `node_id` becomes a child of the promoted node.
    ///
    /// ```text
    ///        A                 C
    ///       / \               / \
    ///      B   C     =>      A   F      (if height(F) >= height(G))
    ///         / \           / \
    ///        F   G         B   G
    /// ```
    fn rotate_up(&mut self, node_id: u32, side: usize) -> u32 {
        let promoted = self.nodes[node_id as usize].children[side];
        let [first, second] = self.nodes[promoted as usize].children;
        let (taller, shorter) =
            if self.nodes[first as usize].height >= self.nodes[second as usize].height {
                (first, second)
            } else {
                (second, first)
            };

        let parent = self.nodes[node_id as usize].parent;
        self.replace_child(parent, node_id, promoted);

        self.nodes[node_id as usize].children[side] = shorter;
        self.nodes[shorter as usize].parent = node_id;
        self.nodes[node_id as usize].parent = promoted;

        // Keep the demoted node on the same side it was relative to the promoted one.
        self.nodes[promoted as usize].children = if side == BvhNode::RIGHT {
            [node_id, taller]
        } else {
            [taller, node_id]
        };

        // Children first.
        self.refresh_node(node_id);
        self.refresh_node(promoted);
        promoted
    }
}
