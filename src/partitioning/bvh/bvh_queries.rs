use super::{Bvh, BvhNode};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::Real;
use crate::query::{Ray, RayCast};

impl BvhNode {
    /// Casts a ray on this node’s AABB.
    ///
    /// Returns [`Real::MAX`] if there is no hit within `max_time_of_impact`.
    #[inline]
    pub fn cast_ray(&self, ray: &Ray, max_time_of_impact: Real) -> Real {
        self.aabb
            .cast_local_ray(ray, max_time_of_impact, true)
            .unwrap_or(Real::MAX)
    }
}

impl Bvh {
    /// Iterates through all the leaves with an AABB intersecting the given `aabb`.
    pub fn intersect_aabb<'a>(&'a self, aabb: &'a Aabb) -> impl Iterator<Item = u32> + 'a {
        self.leaves(|node: &BvhNode| node.aabb().intersects(aabb))
    }

    /// Casts a ray on this BVH using the provided leaf ray-cast function.
    ///
    /// The `primitive_check` delegates the ray-casting task to an external function that
    /// is assumed to map a leaf identifier to an actual geometry to cast a ray on. The `Real`
    /// argument given to that closure is the time of impact of the closest hit found so far (or
    /// is equal to `max_time_of_impact` if nothing was hit so far).
    ///
    /// Nodes are visited closest-first, and any subtree whose AABB is hit later than the best
    /// hit so far is skipped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sdf_bvh3d::bounding_volume::Aabb;
    /// use sdf_bvh3d::math::Real;
    /// use sdf_bvh3d::partitioning::{Bvh, BvhBuildStrategy};
    /// use sdf_bvh3d::query::{Ray, RayCast};
    /// use nalgebra::{Point3, Vector3};
    ///
    /// let aabbs = [
    ///     Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)),
    ///     Aabb::new(Point3::new(5.0, 0.0, 0.0), Point3::new(6.0, 1.0, 1.0)),
    /// ];
    /// let bvh = Bvh::from_leaves(BvhBuildStrategy::default(), &aabbs).unwrap();
    ///
    /// let ray = Ray::new(Point3::new(10.0, 0.5, 0.5), Vector3::new(-1.0, 0.0, 0.0));
    /// let hit = bvh.cast_ray(&ray, Real::MAX, |leaf, best| {
    ///     aabbs[leaf as usize].cast_local_ray(&ray, best, true)
    /// });
    ///
    /// assert_eq!(hit, Some((1, 4.0)));
    /// ```
    pub fn cast_ray(
        &self,
        ray: &Ray,
        max_time_of_impact: Real,
        primitive_check: impl Fn(u32, Real) -> Option<Real>,
    ) -> Option<(u32, Real)> {
        self.find_best(
            max_time_of_impact,
            |node: &BvhNode, best_so_far| node.cast_ray(ray, best_so_far),
            primitive_check,
        )
    }
}
