//! Spatial partitioning tools.

pub use self::bvh::{
    Bvh, BvhBuildStrategy, BvhError, BvhLeafCost, BvhLeafTracker, BvhNode, BvhTrackerConfig,
    BvhWorkspace, FlatBvh, FlatBvhNode, TrackedLeaf, TraversalAction,
};

pub mod bvh;
