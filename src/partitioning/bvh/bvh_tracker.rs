use super::{Bvh, BvhError};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::Real;
use crate::utils::hashmap::HashMap;

/// Configuration of a [`BvhLeafTracker`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BvhTrackerConfig {
    /// Amount by which the bounds of a leaf are loosened when they are committed to the tree.
    ///
    /// A leaf is only moved in the tree once its live bounds leave the loosened bounds. Larger
    /// values mean fewer tree updates but looser boxes. Must be finite and non-negative.
    pub margin: Real,
}

impl Default for BvhTrackerConfig {
    fn default() -> Self {
        Self { margin: 0.1 }
    }
}

/// The state of a leaf tracked by a [`BvhLeafTracker`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct TrackedLeaf {
    /// The loosened bounds currently stored in the tree for this leaf.
    pub fat_aabb: Aabb,
    /// The arena index of the leaf node in the tree.
    ///
    /// Stale after [`Bvh::rebuild`]; use [`Bvh::leaf_node_index`] in that case.
    pub node: u32,
}

/// Keeps the leaves of a [`Bvh`] in sync with moving primitives while limiting restructuring.
///
/// Each tracked leaf is stored in the tree with its bounds loosened by
/// [`BvhTrackerConfig::margin`]. As long as the live bounds of a primitive remain inside these
/// loosened bounds, updating it is a no-op. Otherwise, the leaf is removed and inserted again
/// with freshly loosened bounds.
///
/// The tracker doesn’t own the tree: the same tracker must be passed the same tree at every
/// call.
///
/// # Example
///
/// ```rust
/// use sdf_bvh3d::bounding_volume::Aabb;
/// use sdf_bvh3d::partitioning::{Bvh, BvhLeafTracker, BvhTrackerConfig};
/// use nalgebra::{Point3, Vector3};
///
/// let mut bvh = Bvh::new();
/// let mut tracker = BvhLeafTracker::new(BvhTrackerConfig { margin: 0.5 });
/// let aabb = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// tracker.track(&mut bvh, 0, aabb).unwrap();
///
/// // Small motions don’t touch the tree.
/// let moved = aabb.translated(&Vector3::new(0.25, 0.0, 0.0));
/// assert!(!tracker.update(&mut bvh, 0, moved).unwrap());
///
/// // Larger motions reinsert the leaf.
/// let moved = aabb.translated(&Vector3::new(2.0, 0.0, 0.0));
/// assert!(tracker.update(&mut bvh, 0, moved).unwrap());
/// ```
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BvhLeafTracker {
    config: BvhTrackerConfig,
    leaves: HashMap<u32, TrackedLeaf>,
}

impl BvhLeafTracker {
    /// Creates a tracker without any leaf.
    ///
    /// # Panics
    ///
    /// Panics if the margin is negative or not finite.
    pub fn new(config: BvhTrackerConfig) -> Self {
        assert!(
            config.margin.is_finite() && config.margin >= 0.0,
            "The tracking margin must be finite and non-negative."
        );
        Self {
            config,
            leaves: HashMap::default(),
        }
    }

    /// The configuration of this tracker.
    pub fn config(&self) -> &BvhTrackerConfig {
        &self.config
    }

    /// The state of the tracked leaf with the given identifier.
    pub fn get(&self, leaf_data: u32) -> Option<&TrackedLeaf> {
        self.leaves.get(&leaf_data)
    }

    /// The number of tracked leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Is no leaf tracked?
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Inserts a new leaf into `bvh` with its bounds loosened by the margin, and starts
    /// tracking it.
    ///
    /// Returns the arena index of the new leaf node.
    pub fn track(&mut self, bvh: &mut Bvh, leaf_data: u32, aabb: Aabb) -> Result<u32, BvhError> {
        let fat_aabb = aabb.loosened(self.config.margin);
        let node = bvh.insert(fat_aabb, leaf_data)?;
        let _ = self
            .leaves
            .insert(leaf_data, TrackedLeaf { fat_aabb, node });
        Ok(node)
    }

    /// Removes a tracked leaf from `bvh` and stops tracking it.
    ///
    /// Returns the loosened bounds the leaf had in the tree.
    pub fn untrack(&mut self, bvh: &mut Bvh, leaf_data: u32) -> Result<Aabb, BvhError> {
        if !self.leaves.contains_key(&leaf_data) {
            return Err(BvhError::NodeNotFound { leaf: leaf_data });
        }

        let aabb = bvh.remove(leaf_data)?;
        let _ = self.leaves.remove(&leaf_data);
        Ok(aabb)
    }

    /// Checks the live bounds of a tracked leaf against its loosened bounds.
    ///
    /// Returns `Ok(false)` if `aabb` is still contained by the loosened bounds, in which case
    /// nothing is modified. Otherwise the leaf is moved in the tree with
    /// [`Bvh::update_bounds`] and `Ok(true)` is returned.
    pub fn update(&mut self, bvh: &mut Bvh, leaf_data: u32, aabb: Aabb) -> Result<bool, BvhError> {
        let tracked = self
            .leaves
            .get_mut(&leaf_data)
            .ok_or(BvhError::NodeNotFound { leaf: leaf_data })?;

        if tracked.fat_aabb.contains(&aabb) {
            return Ok(false);
        }

        let fat_aabb = aabb.loosened(self.config.margin);
        tracked.node = bvh.update_bounds(fat_aabb, leaf_data)?;
        tracked.fat_aabb = fat_aabb;
        log::trace!("Reinserted leaf {} at node {}.", leaf_data, tracked.node);
        Ok(true)
    }

    /// Applies [`BvhLeafTracker::update`] to a whole frame of live bounds.
    ///
    /// Returns the number of leaves that were reinserted. Stops at the first error, the
    /// updates applied before it are kept.
    pub fn update_all(
        &mut self,
        bvh: &mut Bvh,
        live_bounds: impl IntoIterator<Item = (u32, Aabb)>,
    ) -> Result<usize, BvhError> {
        let mut reinserted = 0;

        for (leaf_data, aabb) in live_bounds {
            if self.update(bvh, leaf_data, aabb)? {
                reinserted += 1;
            }
        }

        Ok(reinserted)
    }
}

#[cfg(test)]
mod test {
    use crate::bounding_volume::{Aabb, BoundingVolume};
    use crate::math::{Point, Real, Vector};
    use crate::partitioning::{Bvh, BvhError, BvhLeafTracker, BvhTrackerConfig};

    fn cube(x: Real) -> Aabb {
        Aabb::new(Point::new(x, 0.0, 0.0), Point::new(x + 1.0, 1.0, 1.0))
    }

    #[test]
    fn tracked_leaves_are_loosened() {
        let mut bvh = Bvh::new();
        let mut tracker = BvhLeafTracker::new(BvhTrackerConfig { margin: 0.25 });
        assert_eq!(tracker.config().margin, 0.25);
        let node = tracker.track(&mut bvh, 3, cube(0.0)).unwrap();

        let tracked = tracker.get(3).unwrap();
        assert_eq!(tracked.node, node);
        assert_eq!(tracked.fat_aabb, cube(0.0).loosened(0.25));
        assert_eq!(bvh.leaf_node(3).unwrap().aabb(), tracked.fat_aabb);
    }

    #[test]
    fn untracked_ids_are_reported() {
        let mut bvh = Bvh::new();
        let mut tracker = BvhLeafTracker::default();
        assert_eq!(*tracker.config(), BvhTrackerConfig::default());
        assert_eq!(
            tracker.update(&mut bvh, 1, cube(0.0)),
            Err(BvhError::NodeNotFound { leaf: 1 })
        );
        assert_eq!(
            tracker.untrack(&mut bvh, 1),
            Err(BvhError::NodeNotFound { leaf: 1 })
        );
    }

    #[test]
    fn invalid_live_bounds_leave_everything_untouched() {
        let mut bvh = Bvh::new();
        let mut tracker = BvhLeafTracker::default();
        let _ = tracker.track(&mut bvh, 0, cube(0.0)).unwrap();
        let before = *tracker.get(0).unwrap();

        let nan = Aabb::new(Point::new(Real::NAN, 0.0, 0.0), Point::new(1.0, 1.0, 1.0));
        assert!(matches!(
            tracker.update(&mut bvh, 0, nan),
            Err(BvhError::DegenerateBounds { leaf: 0, .. })
        ));
        assert_eq!(*tracker.get(0).unwrap(), before);
        assert_eq!(bvh.leaf_node(0).unwrap().aabb(), before.fat_aabb);
    }

    #[test]
    fn update_all_counts_reinsertions() {
        let mut bvh = Bvh::new();
        let mut tracker = BvhLeafTracker::new(BvhTrackerConfig { margin: 0.5 });

        for i in 0..10 {
            let _ = tracker.track(&mut bvh, i, cube(i as Real * 3.0)).unwrap();
        }

        // Even leaves barely move, odd leaves jump.
        let frame = (0..10).map(|i| {
            let shift = if i % 2 == 0 { 0.1 } else { 1.0 };
            (i, cube(i as Real * 3.0).translated(&Vector::new(shift, 0.0, 0.0)))
        });
        assert_eq!(tracker.update_all(&mut bvh, frame).unwrap(), 5);
        bvh.assert_well_formed();
        bvh.assert_balanced();

        let _ = tracker.untrack(&mut bvh, 4).unwrap();
        assert_eq!(tracker.len(), 9);
        assert_eq!(bvh.leaf_count(), 9);
    }
}
