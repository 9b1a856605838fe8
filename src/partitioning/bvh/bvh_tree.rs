use super::bvh_median_build::BvhBuildItem;
use super::BvhError;
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::{Point, Real};
use crate::utils::hashmap::HashMap;
use alloc::collections::VecDeque;
use alloc::vec::Vec;

/// The strategy for one-time build of the tree.
///
/// Both strategies split a range of leaves along the widest axis of its bounding box, they
/// only differ in where the splitting plane is placed.
#[derive(Default, Clone, Debug, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum BvhBuildStrategy {
    /// Split at the center of the range's bounding box.
    ///
    /// The leaves are partitioned in-place depending on which side of the center their own
    /// center lies. If that partition is too lopsided to keep the tree height-balanced (for
    /// example when all the leaves end up on the same side), the range is split at the median
    /// instead. The resulting tree thus has the same height as with [`BvhBuildStrategy::Median`].
    #[default]
    Midpoint,
    /// Split at the median leaf center.
    ///
    /// This always splits ranges into two halves with the same leaf count (up to one leaf),
    /// so the resulting tree has a height of exactly `⌈log2(n)⌉` for `n` leaves.
    Median,
}

/// Workspace data for various operations on the tree.
///
/// This is all temporary data that can be freed at any time without affecting results.
/// The main reason to reuse the same instance of this over time is to lower costs of internal
/// allocations.
#[derive(Clone, Default, Debug)]
pub struct BvhWorkspace {
    pub(super) stack: Vec<u32>,
    pub(super) top_down_order: Vec<u32>,
    pub(super) refit_leaves: Vec<(u32, Aabb)>,
    pub(super) queue: VecDeque<u32>,
    pub(super) build_leaves: Vec<(u32, Aabb)>,
    pub(super) build_stack: Vec<BvhBuildItem>,
}

/// A node (internal or leaf) of a BVH.
///
/// Nodes are stored in an arena owned by the [`Bvh`] and reference each other through their
/// `u32` index in that arena. [`BvhNode::NONE`] is used as a sentinel for missing links.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BvhNode {
    pub(super) aabb: Aabb,
    pub(super) parent: u32,
    pub(super) children: [u32; 2],
    pub(super) height: u32,
    pub(super) leaf_data: u32,
}

impl BvhNode {
    /// Sentinel value for a missing node index or a missing leaf identifier.
    pub const NONE: u32 = u32::MAX;
    pub(super) const LEFT: usize = 0;
    pub(super) const RIGHT: usize = 1;

    /// Initializes a leaf without parent.
    #[inline]
    pub fn leaf(aabb: Aabb, leaf_data: u32) -> Self {
        Self {
            aabb,
            parent: Self::NONE,
            children: [Self::NONE; 2],
            height: 0,
            leaf_data,
        }
    }

    /// An unlinked internal node. Its children, AABB and height must be set before it is
    /// reachable from the root.
    #[inline]
    pub(super) fn placeholder() -> Self {
        Self {
            aabb: Aabb::new_invalid(),
            parent: Self::NONE,
            children: [Self::NONE; 2],
            height: 0,
            leaf_data: Self::NONE,
        }
    }

    /// If this node is a leaf, returns its associated identifier provided at insertion time.
    #[inline]
    pub fn leaf_data(&self) -> Option<u32> {
        self.is_leaf().then_some(self.leaf_data)
    }

    /// Is this node a leaf?
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.leaf_data != Self::NONE
    }

    /// The index of this node’s parent, or `None` if this is the root.
    #[inline]
    pub fn parent(&self) -> Option<u32> {
        (self.parent != Self::NONE).then_some(self.parent)
    }

    /// The indices of the left and right children, or `None` if this is a leaf.
    #[inline]
    pub fn children(&self) -> Option<[u32; 2]> {
        (!self.is_leaf()).then_some(self.children)
    }

    /// The height of the subtree rooted at this node. Leaves have a height of 0.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// This node’s AABB.
    #[inline]
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    /// The center of this node’s AABB.
    #[inline]
    pub fn center(&self) -> Point<Real> {
        self.aabb.center()
    }
}

/// Rejects leaves that can’t be stored in a BVH.
///
/// The identifier [`BvhNode::NONE`] is reserved, and the AABB must be finite and not inverted
/// so that NaNs never make it into the tree costs.
pub(super) fn check_leaf(leaf_data: u32, aabb: &Aabb) -> Result<(), BvhError> {
    if leaf_data == BvhNode::NONE {
        Err(BvhError::ReservedLeafId { leaf: leaf_data })
    } else if !aabb.is_valid() {
        Err(BvhError::DegenerateBounds {
            leaf: leaf_data,
            aabb: *aabb,
        })
    } else {
        Ok(())
    }
}

/// A dynamic Bounding Volume Hierarchy designed for culling signed-distance-field primitives.
///
/// All nodes live in a single arena and are addressed by `u32` indices. For `n` leaves, the
/// tree contains exactly `2n - 1` live nodes. Slots freed by removals are recycled by later
/// insertions.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Bvh {
    pub(super) nodes: Vec<BvhNode>,
    pub(super) free_list: Vec<u32>,
    pub(super) root: u32,
    // Maps the leaf identifiers given by the user to the index of their node.
    pub(super) leaf_node_indices: HashMap<u32, u32>,
}

impl Default for Bvh {
    fn default() -> Self {
        Self::new()
    }
}

impl Bvh {
    /// An empty BVH.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: BvhNode::NONE,
            leaf_node_indices: HashMap::default(),
        }
    }

    /// An empty BVH with enough room to store `leaf_capacity` leaves without reallocating.
    pub fn with_capacity(leaf_capacity: usize) -> Self {
        let mut result = Self::new();
        result.nodes.reserve((2 * leaf_capacity).saturating_sub(1));
        result.leaf_node_indices.reserve(leaf_capacity);
        result
    }

    /// Removes every node from this tree.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_list.clear();
        self.root = BvhNode::NONE;
        self.leaf_node_indices.clear();
    }

    /// Does this tree not contain any leaf?
    pub fn is_empty(&self) -> bool {
        self.root == BvhNode::NONE
    }

    /// The index of the root node, or `None` if the tree is empty.
    pub fn root(&self) -> Option<u32> {
        (self.root != BvhNode::NONE).then_some(self.root)
    }

    /// The AABB bounding everything contained by this BVH, or `None` if it is empty.
    pub fn root_aabb(&self) -> Option<Aabb> {
        self.root().map(|root| self.nodes[root as usize].aabb)
    }

    /// The number of leaves of this tree.
    pub fn leaf_count(&self) -> u32 {
        self.leaf_node_indices.len() as u32
    }

    /// The number of live nodes (internal and leaves) of this tree.
    ///
    /// This is `2 * leaf_count - 1` for any non-empty tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// The height of the tree, i.e., the height of its root.
    ///
    /// Returns 0 for an empty tree as well as for a tree with a single leaf.
    pub fn max_height(&self) -> u32 {
        self.root()
            .map(|root| self.nodes[root as usize].height)
            .unwrap_or(0)
    }

    /// The node stored at the given arena index, if it is alive.
    pub fn node(&self, index: u32) -> Option<&BvhNode> {
        let node = self.nodes.get(index as usize)?;
        (node.is_leaf() || node.children[0] != BvhNode::NONE).then_some(node)
    }

    /// Reference to the leaf associated to the given identifier at insertion time.
    pub fn leaf_node(&self, leaf_data: u32) -> Option<&BvhNode> {
        let idx = self.leaf_node_indices.get(&leaf_data)?;
        Some(&self.nodes[*idx as usize])
    }

    /// The arena index of the leaf associated to the given identifier.
    pub fn leaf_node_index(&self, leaf_data: u32) -> Option<u32> {
        self.leaf_node_indices.get(&leaf_data).copied()
    }

    /// Does this tree contain a leaf with the given identifier?
    pub fn contains_leaf(&self, leaf_data: u32) -> bool {
        self.leaf_node_indices.contains_key(&leaf_data)
    }

    /// Iterates through the identifiers of all the leaves of this tree, in no particular order.
    pub fn leaf_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.leaf_node_indices.keys().copied()
    }

    /// An approximation of the memory usage (in bytes) for this struct plus
    /// the memory it allocates dynamically.
    pub fn total_memory_size(&self) -> usize {
        size_of::<Self>() + self.heap_memory_size()
    }

    /// An approximation of the memory dynamically-allocated by this struct.
    pub fn heap_memory_size(&self) -> usize {
        let Self {
            nodes,
            free_list,
            root: _,
            leaf_node_indices,
        } = self;
        nodes.capacity() * size_of::<BvhNode>()
            + free_list.capacity() * size_of::<u32>()
            + leaf_node_indices.capacity() * size_of::<(u32, u32)>()
    }

    pub(super) fn alloc_node(&mut self, node: BvhNode) -> u32 {
        if let Some(id) = self.free_list.pop() {
            self.nodes[id as usize] = node;
            id
        } else {
            self.nodes.push(node);
            (self.nodes.len() - 1) as u32
        }
    }

    pub(super) fn free_node(&mut self, id: u32) {
        self.nodes[id as usize] = BvhNode::placeholder();
        self.free_list.push(id);
    }

    /// Puts `new` where `old` was in the children of `parent`.
    ///
    /// If `parent` is [`BvhNode::NONE`], `new` becomes the root.
    pub(super) fn replace_child(&mut self, parent: u32, old: u32, new: u32) {
        if parent == BvhNode::NONE {
            self.root = new;
        } else {
            let children = &mut self.nodes[parent as usize].children;
            if children[BvhNode::LEFT] == old {
                children[BvhNode::LEFT] = new;
            } else {
                debug_assert_eq!(children[BvhNode::RIGHT], old);
                children[BvhNode::RIGHT] = new;
            }
        }

        self.nodes[new as usize].parent = parent;
    }

    /// Recomputes the AABB and height of an internal node from its children.
    #[inline]
    pub(super) fn refresh_node(&mut self, id: u32) {
        let [left, right] = self.nodes[id as usize].children;
        let left = &self.nodes[left as usize];
        let right = &self.nodes[right as usize];
        let aabb = left.aabb.merged(&right.aabb);
        let height = 1 + left.height.max(right.height);

        let node = &mut self.nodes[id as usize];
        node.aabb = aabb;
        node.height = height;
    }
}
