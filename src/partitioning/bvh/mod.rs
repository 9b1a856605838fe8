//! A dynamic bounding-volume hierarchy over axis-aligned bounding boxes.

pub use bvh_debug::BvhDebugTree;
pub use bvh_error::BvhError;
pub use bvh_flatten::{FlatBvh, FlatBvhNode};
pub use bvh_tracker::{BvhLeafTracker, BvhTrackerConfig, TrackedLeaf};
pub use bvh_traverse::{BvhLeafCost, Leaves, TraversalAction};
pub use bvh_tree::{Bvh, BvhBuildStrategy, BvhNode, BvhWorkspace};

mod bvh_debug;
mod bvh_error;
mod bvh_flatten;
mod bvh_insert;
mod bvh_median_build;
mod bvh_queries;
mod bvh_rebalance;
mod bvh_refit;
mod bvh_remove;
mod bvh_tracker;
mod bvh_traverse;
mod bvh_tree;
mod bvh_validation;
