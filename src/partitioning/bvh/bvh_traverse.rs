use super::BvhNode;
use crate::math::Real;
use crate::partitioning::Bvh;
use smallvec::SmallVec;

pub(super) const TRAVERSAL_STACK_SIZE: usize = 32;

/// Iterator over the identifiers of the leaves of a [`Bvh`], in depth-first order.
///
/// Created by [`Bvh::leaves`].
pub struct Leaves<'a, Check: Fn(&BvhNode) -> bool> {
    tree: &'a Bvh,
    stack: SmallVec<[u32; TRAVERSAL_STACK_SIZE]>,
    check: Check,
}

impl<'a, Check: Fn(&BvhNode) -> bool> Leaves<'a, Check> {
    /// Starts iterating on the leaves of `tree` whose ancestors (and themselves) pass `check`.
    pub fn new(tree: &'a Bvh, check: Check) -> Leaves<'a, Check> {
        let mut stack = SmallVec::default();

        if let Some(root) = tree.root() {
            stack.push(root);
        }

        Leaves { tree, stack, check }
    }
}

impl<Check: Fn(&BvhNode) -> bool> Iterator for Leaves<'_, Check> {
    type Item = u32;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = &self.tree.nodes[id as usize];

            if !(self.check)(node) {
                continue;
            }

            if node.is_leaf() {
                return Some(node.leaf_data);
            }

            // Push right first so the left subtree is visited first.
            self.stack.push(node.children[BvhNode::RIGHT]);
            self.stack.push(node.children[BvhNode::LEFT]);
        }

        None
    }
}

/// Cost associated to a BVH leaf during best-first traversal.
pub trait BvhLeafCost {
    /// The cost value associated to the leaf.
    ///
    /// Best-first searches for the leaf with the lowest cost.
    fn cost(&self) -> Real;
}

impl BvhLeafCost for Real {
    #[inline(always)]
    fn cost(&self) -> Real {
        *self
    }
}

impl<T> BvhLeafCost for (Real, T) {
    #[inline(always)]
    fn cost(&self) -> Real {
        self.0
    }
}

impl Bvh {
    /// Iterates through the leaves, in depth-first order.
    ///
    /// The `check_node` closure is called on every traversed node. If it returns `false` then the
    /// node and all its descendants won’t be iterated on. This is useful for pruning whole
    /// sub-trees based on a geometric predicate on the node’s AABB.
    ///
    /// See also the [`Bvh::traverse`] function which takes a closure that implements [`FnMut`]
    /// instead of [`Fn`].
    pub fn leaves<F: Fn(&BvhNode) -> bool>(&self, check_node: F) -> Leaves<'_, F> {
        Leaves::new(self, check_node)
    }
}

/// Controls the execution flow of [`Bvh::traverse`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraversalAction {
    /// The traversal will continue on the children of the tested node.
    Continue,
    /// The traversal will skip all descendants of the tested node.
    Prune,
    /// The traversal will exit immediately.
    EarlyExit,
}

impl Bvh {
    #[inline(always)]
    pub(super) fn traversal_stack() -> SmallVec<[u32; TRAVERSAL_STACK_SIZE]> {
        Default::default()
    }

    /// Traverses the BVH in depth-first order with full control over traversal.
    ///
    /// For each visited node (starting with the root), `check_node` decides whether to
    /// descend into its children ([`TraversalAction::Continue`]), skip its subtree
    /// ([`TraversalAction::Prune`]) or stop everything ([`TraversalAction::EarlyExit`]).
    /// Left children are visited before right children.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sdf_bvh3d::bounding_volume::{Aabb, BoundingVolume};
    /// use sdf_bvh3d::partitioning::{Bvh, BvhBuildStrategy, TraversalAction};
    /// use nalgebra::Point3;
    ///
    /// let aabbs = [
    ///     Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)),
    ///     Aabb::new(Point3::new(5.0, 0.0, 0.0), Point3::new(6.0, 1.0, 1.0)),
    ///     Aabb::new(Point3::new(10.0, 0.0, 0.0), Point3::new(11.0, 1.0, 1.0)),
    /// ];
    /// let bvh = Bvh::from_leaves(BvhBuildStrategy::default(), &aabbs).unwrap();
    ///
    /// let region = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(7.0, 2.0, 2.0));
    /// let mut count = 0;
    /// bvh.traverse(|node| {
    ///     if !node.aabb().intersects(&region) {
    ///         return TraversalAction::Prune;
    ///     }
    ///
    ///     if node.is_leaf() {
    ///         count += 1;
    ///     }
    ///
    ///     TraversalAction::Continue
    /// });
    ///
    /// assert_eq!(count, 2);
    /// ```
    pub fn traverse(&self, mut check_node: impl FnMut(&BvhNode) -> TraversalAction) {
        let mut stack = Self::traversal_stack();

        if let Some(root) = self.root() {
            stack.push(root);
        }

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];

            match check_node(node) {
                TraversalAction::Continue => {
                    if !node.is_leaf() {
                        stack.push(node.children[BvhNode::RIGHT]);
                        stack.push(node.children[BvhNode::LEFT]);
                    }
                }
                TraversalAction::Prune => {}
                TraversalAction::EarlyExit => return,
            }
        }
    }

    /// Find the leaf that minimizes their associated cost.
    ///
    /// `aabb_cost` gives a lower bound of the cost of every leaf in the subtree of a node. It
    /// also receives the best cost found so far. Subtrees with a lower bound not smaller than
    /// the best cost are skipped, and the child with the smallest bound is always visited
    /// first. `leaf_cost` computes the actual cost of a leaf from its identifier, or `None` if
    /// the leaf should be ignored.
    ///
    /// Returns the identifier of the best leaf together with its cost value, or `None` if no
    /// leaf has a cost smaller than `max_cost`.
    pub fn find_best<L: BvhLeafCost>(
        &self,
        max_cost: Real,
        aabb_cost: impl Fn(&BvhNode, Real) -> Real,
        leaf_cost: impl Fn(u32, Real) -> Option<L>,
    ) -> Option<(u32, L)> {
        let mut stack: SmallVec<[(u32, Real); TRAVERSAL_STACK_SIZE]> = SmallVec::new();
        let mut best_val = None;
        let mut best_cost = max_cost;
        let mut best_id = BvhNode::NONE;

        let root = self.root()?;
        let root_node = &self.nodes[root as usize];

        stack.push((root, aabb_cost(root_node, best_cost)));

        while let Some((id, score)) = stack.pop() {
            // The best cost may have improved since this node was pushed.
            if score >= best_cost {
                continue;
            }

            let node = &self.nodes[id as usize];

            if node.is_leaf() {
                if let Some(primitive_val) = leaf_cost(node.leaf_data, best_cost) {
                    let primitive_score = primitive_val.cost();
                    if primitive_score < best_cost {
                        best_val = Some(primitive_val);
                        best_cost = primitive_score;
                        best_id = node.leaf_data;
                    }
                }
                continue;
            }

            let [mut left, mut right] = node.children;
            let mut left_score = aabb_cost(&self.nodes[left as usize], best_cost);
            let mut right_score = aabb_cost(&self.nodes[right as usize], best_cost);

            if left_score > right_score {
                core::mem::swap(&mut left_score, &mut right_score);
                core::mem::swap(&mut left, &mut right);
            }

            // Push the farthest child first so the closest one is popped next.
            if right_score < best_cost {
                stack.push((right, right_score));
            }

            if left_score < best_cost {
                stack.push((left, left_score));
            }
        }

        best_val.map(|val| (best_id, val))
    }
}
