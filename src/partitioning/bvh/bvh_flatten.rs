use super::bvh_traverse::TRAVERSAL_STACK_SIZE;
use super::{Bvh, BvhNode, BvhWorkspace};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::{Point, Real};
use crate::query::{Ray, RayCast};
use alloc::vec::Vec;
use smallvec::SmallVec;

/// A node of a flattened BVH, laid out for direct upload into a GPU buffer.
///
/// The record is 32 bytes: `mins` and `child_offset` fill the first 16-byte row, `maxs` and
/// `leaf_id` fill the second one. A shader can thus read it as two `vec4`.
///
/// - For an internal node, the left child is at index `child_offset` of the flat array and the
///   right child at index `child_offset + 1`. `leaf_id` is [`FlatBvhNode::NO_LEAF`].
/// - For a leaf, `child_offset` is [`FlatBvhNode::NO_CHILD`] and `leaf_id` is the identifier
///   given when the leaf was inserted.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "bytemuck", derive(bytemuck::Pod, bytemuck::Zeroable))]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(C)]
pub struct FlatBvhNode {
    /// The min corner of this node’s AABB.
    pub mins: [Real; 3],
    /// Index of the left child in the flat array, or [`FlatBvhNode::NO_CHILD`] for leaves.
    pub child_offset: i32,
    /// The max corner of this node’s AABB.
    pub maxs: [Real; 3],
    /// The leaf identifier, or [`FlatBvhNode::NO_LEAF`] for internal nodes.
    pub leaf_id: u32,
}

impl FlatBvhNode {
    /// Value of `child_offset` for leaves.
    pub const NO_CHILD: i32 = -1;
    /// Value of `leaf_id` for internal nodes. This has the same bit pattern as `-1i32`.
    pub const NO_LEAF: u32 = BvhNode::NONE;

    fn from_node(node: &BvhNode, child_offset: i32) -> Self {
        Self {
            mins: node.aabb.mins.coords.into(),
            child_offset,
            maxs: node.aabb.maxs.coords.into(),
            leaf_id: node.leaf_data,
        }
    }

    /// The AABB of this node.
    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::new(Point::from(self.mins), Point::from(self.maxs))
    }

    /// Is this node a leaf?
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.child_offset == Self::NO_CHILD
    }

    /// The leaf identifier, if this node is a leaf.
    #[inline]
    pub fn leaf_id(&self) -> Option<u32> {
        self.is_leaf().then_some(self.leaf_id)
    }

    /// The indices of the left and right children in the flat array, if this is an internal node.
    #[inline]
    pub fn children(&self) -> Option<[usize; 2]> {
        (!self.is_leaf()).then(|| {
            let left = self.child_offset as usize;
            [left, left + 1]
        })
    }
}

/// A BVH flattened in breadth-first order.
///
/// The root, if any, is at index 0. Created by [`Bvh::flatten`]. This mirrors the buffer a GPU
/// traversal kernel works on, and provides CPU reference traversals over it.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct FlatBvh {
    nodes: Vec<FlatBvhNode>,
}

impl FlatBvh {
    /// The flat nodes.
    #[inline]
    pub fn as_slice(&self) -> &[FlatBvhNode] {
        &self.nodes
    }

    /// The number of nodes. This is `2n - 1` for a tree with `n` leaves.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Is there no node at all?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Extracts the vector of flat nodes.
    #[inline]
    pub fn into_vec(self) -> Vec<FlatBvhNode> {
        self.nodes
    }

    /// The raw bytes of the flat nodes, ready for a GPU buffer upload.
    #[cfg(feature = "bytemuck")]
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    /// Identifiers of all the leaves with an AABB hit by `ray` within `max_time_of_impact`.
    ///
    /// The leaves are listed in the order a stack-based traversal visits them.
    pub fn leaves_intersecting_ray(&self, ray: &Ray, max_time_of_impact: Real) -> Vec<u32> {
        self.collect_leaves(|aabb| aabb.intersects_local_ray(ray, max_time_of_impact))
    }

    /// Identifiers of all the leaves with an AABB intersecting `aabb`.
    pub fn leaves_intersecting_aabb(&self, aabb: &Aabb) -> Vec<u32> {
        self.collect_leaves(|node_aabb| node_aabb.intersects(aabb))
    }

    fn collect_leaves(&self, check: impl Fn(&Aabb) -> bool) -> Vec<u32> {
        let mut result = Vec::new();
        let mut stack: SmallVec<[usize; TRAVERSAL_STACK_SIZE]> = SmallVec::new();

        if !self.nodes.is_empty() {
            stack.push(0);
        }

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];

            if !check(&node.aabb()) {
                continue;
            }

            match node.children() {
                Some([left, right]) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => result.push(node.leaf_id),
            }
        }

        result
    }
}

impl Bvh {
    /// Linearizes this tree into a breadth-first array of [`FlatBvhNode`].
    ///
    /// See [`Bvh::flatten_into`] for details on the layout.
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
    /// let flat = bvh.flatten();
    /// assert_eq!(flat.len(), 5);
    /// assert_eq!(flat.as_slice()[0].child_offset, 1);
    ///
    /// let mut leaves: Vec<_> = flat.as_slice().iter().filter_map(|n| n.leaf_id()).collect();
    /// leaves.sort();
    /// assert_eq!(leaves, [0, 1, 2]);
    /// ```
    pub fn flatten(&self) -> FlatBvh {
        let mut workspace = BvhWorkspace::default();
        let mut nodes = Vec::with_capacity(self.node_count());
        self.flatten_into(&mut workspace, &mut nodes);
        FlatBvh { nodes }
    }

    /// Linearizes this tree into `out`, replacing its previous content.
    ///
    /// Nodes are written in breadth-first order starting with the root at index 0. The two
    /// children of an internal node are always consecutive, the left one at the index stored in
    /// its `child_offset`. Exactly [`Bvh::node_count`] records are written, none for an empty
    /// tree.
    pub fn flatten_into(&self, workspace: &mut BvhWorkspace, out: &mut Vec<FlatBvhNode>) {
        out.clear();
        workspace.queue.clear();

        if let Some(root) = self.root() {
            workspace.queue.push_back(root);
        }

        while let Some(id) = workspace.queue.pop_front() {
            let node = &self.nodes[id as usize];

            if node.is_leaf() {
                out.push(FlatBvhNode::from_node(node, FlatBvhNode::NO_CHILD));
            } else {
                // Every node already queued gets an output slot before the children of this one.
                let child_offset = out.len() + 1 + workspace.queue.len();
                out.push(FlatBvhNode::from_node(node, child_offset as i32));
                workspace.queue.push_back(node.children[BvhNode::LEFT]);
                workspace.queue.push_back(node.children[BvhNode::RIGHT]);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::FlatBvhNode;
    use crate::bounding_volume::{Aabb, BoundingVolume};
    use crate::math::{Point, Real, Vector};
    use crate::partitioning::{Bvh, BvhBuildStrategy, BvhWorkspace};
    use crate::query::Ray;

    fn cube(x: Real) -> Aabb {
        Aabb::new(Point::new(x, 0.0, 0.0), Point::new(x + 1.0, 1.0, 1.0))
    }

    #[test]
    fn flat_node_layout() {
        assert_eq!(size_of::<FlatBvhNode>(), 32);
        assert_eq!(align_of::<FlatBvhNode>(), 4);
        assert_eq!(FlatBvhNode::NO_LEAF as i32, -1);
    }

    #[test]
    fn empty_tree_flattens_to_nothing() {
        let bvh = Bvh::new();
        assert!(bvh.flatten().is_empty());

        let mut out = vec![FlatBvhNode {
            mins: [0.0; 3],
            child_offset: 0,
            maxs: [0.0; 3],
            leaf_id: 0,
        }];
        bvh.flatten_into(&mut BvhWorkspace::default(), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn flat_links_match_tree() {
        let leaves: Vec<_> = (0..13).map(|i| cube(i as Real * 2.0)).collect();
        let bvh = Bvh::from_leaves(BvhBuildStrategy::Midpoint, &leaves).unwrap();
        let flat = bvh.flatten();
        let nodes = flat.as_slice();

        assert_eq!(nodes.len(), 25);
        assert_eq!(nodes[0].aabb(), bvh.root_aabb().unwrap());

        let mut seen = vec![false; 13];
        for (i, node) in nodes.iter().enumerate() {
            match node.children() {
                Some([left, right]) => {
                    // Breadth-first order: children always come after their parent.
                    assert!(left > i);
                    assert_eq!(node.leaf_id, FlatBvhNode::NO_LEAF);
                    let merged = nodes[left].aabb().merged(&nodes[right].aabb());
                    assert_eq!(node.aabb(), merged);
                }
                None => {
                    let leaf = node.leaf_id as usize;
                    assert!(!seen[leaf]);
                    seen[leaf] = true;
                    assert_eq!(node.aabb(), leaves[leaf]);
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn flat_traversals() {
        let leaves: Vec<_> = (0..10).map(|i| cube(i as Real * 3.0)).collect();
        let bvh = Bvh::from_leaves(BvhBuildStrategy::Median, &leaves).unwrap();
        let flat = bvh.flatten();

        let ray = Ray::new(Point::new(-1.0, 0.5, 0.5), Vector::x());
        let mut hits = flat.leaves_intersecting_ray(&ray, 10.0);
        hits.sort();
        assert_eq!(hits, [0, 1, 2, 3]);

        let ray = Ray::new(Point::new(3.5, -1.0, 0.5), Vector::y());
        assert_eq!(flat.leaves_intersecting_ray(&ray, Real::MAX), [1]);

        let region = Aabb::new(Point::new(5.5, 0.0, 0.0), Point::new(12.5, 1.0, 1.0));
        let mut overlaps = flat.leaves_intersecting_aabb(&region);
        overlaps.sort();
        assert_eq!(overlaps, [2, 3, 4]);
    }

    #[cfg(feature = "bytemuck")]
    #[test]
    fn flat_bytes() {
        let bvh = Bvh::from_leaves(BvhBuildStrategy::Midpoint, &[cube(0.0), cube(2.0)]).unwrap();
        let flat = bvh.flatten();
        let bytes = flat.as_bytes();
        assert_eq!(bytes.len(), 3 * 32);
        let nodes: &[FlatBvhNode] = bytemuck::cast_slice(bytes);
        assert_eq!(nodes, flat.as_slice());
    }
}
