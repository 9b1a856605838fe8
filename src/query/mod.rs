//! Non-persistent geometric queries.
//!
//! Ray-casting against bounding volumes is achieved by importing the [`RayCast`] trait.
//! Intersections between rays and the actual primitives stored in a BVH are out of the
//! scope of this crate: the tree traversals delegate them to a user-provided closure.

pub use self::ray::{Ray, RayCast};

mod ray;
