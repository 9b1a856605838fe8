//! Traits and structure needed to cast rays.

use crate::math::{Point, Real, Vector};

/// A ray for ray-casting queries.
///
/// A ray is a half-infinite line starting at `origin` and extending along `dir`. Points
/// along the ray are `origin + dir * t` for `t ≥ 0`. The direction does not need to be
/// normalized, but time-of-impacts are only actual distances if it is.
///
/// # Example
///
/// ```rust
/// use sdf_bvh3d::query::Ray;
/// use nalgebra::{Point3, Vector3};
///
/// let ray = Ray::new(Point3::origin(), Vector3::new(1.0, 0.0, 0.0));
/// assert_eq!(ray.point_at(4.0), Point3::new(4.0, 0.0, 0.0));
/// ```
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(C)]
pub struct Ray {
    /// Starting point of the ray.
    pub origin: Point<Real>,
    /// Direction vector of the ray.
    pub dir: Vector<Real>,
}

impl Ray {
    /// Creates a new ray from an origin point and direction vector.
    pub fn new(origin: Point<Real>, dir: Vector<Real>) -> Ray {
        Ray { origin, dir }
    }

    /// Computes the point `origin + dir * t` along the ray.
    #[inline]
    pub fn point_at(&self, t: Real) -> Point<Real> {
        self.origin + self.dir * t
    }
}

/// Traits of objects which can be tested for intersection with a ray.
pub trait RayCast {
    /// Computes the time of impact between this shape and a ray.
    ///
    /// If `solid` is `true`, a ray starting inside of the shape hits it at `t = 0`.
    /// Otherwise the hit is reported where the ray exits the shape.
    fn cast_local_ray(&self, ray: &Ray, max_time_of_impact: Real, solid: bool) -> Option<Real>;

    /// Tests whether a ray intersects this shape within `max_time_of_impact`.
    #[inline]
    fn intersects_local_ray(&self, ray: &Ray, max_time_of_impact: Real) -> bool {
        self.cast_local_ray(ray, max_time_of_impact, true).is_some()
    }
}
