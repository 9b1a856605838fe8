extern crate nalgebra as na;

mod bulk_build;
mod dynamic_tree;
mod flatten;
mod margin_hysteresis;
mod refit;

use na::Point3;
use sdf_bvh3d::bounding_volume::Aabb;
use sdf_bvh3d::math::Real;

/// A unit cube with its min corner at `(x, 0, 0)`.
pub fn unit_cube(x: Real) -> Aabb {
    Aabb::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0))
}
