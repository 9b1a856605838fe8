use crate::unit_cube;
use sdf_bvh3d::partitioning::{Bvh, BvhBuildStrategy, BvhWorkspace};

#[test]
fn refit_is_idempotent() {
    let leaves: Vec<_> = (0..37).map(|i| unit_cube((i * 7 % 37) as f32)).collect();
    let mut bvh = Bvh::from_leaves(BvhBuildStrategy::Midpoint, &leaves).unwrap();
    let mut workspace = BvhWorkspace::default();

    for i in 0..37 {
        bvh.set_leaf_aabb_partially(i, unit_cube(i as f32 * 0.5)).unwrap();
    }

    bvh.refit(&mut workspace);
    bvh.assert_well_formed();
    let once = bvh.flatten();
    let cost = bvh.calculate_cost();

    bvh.refit(&mut workspace);
    assert_eq!(bvh.flatten(), once);
    assert_eq!(bvh.calculate_cost(), cost);
}

#[test]
fn refit_keeps_topology() {
    let mut bvh = Bvh::new();
    let mut workspace = BvhWorkspace::default();

    for i in 0..16 {
        let _ = bvh.insert(unit_cube(i as f32 * 2.0), i).unwrap();
    }

    let leaves_before = bvh.depth_first_leaves();
    let height_before = bvh.max_height();

    bvh.refit_with(&mut workspace, |i| unit_cube(i as f32 * 2.0 + 0.5))
        .unwrap();
    bvh.assert_well_formed();

    assert_eq!(bvh.depth_first_leaves(), leaves_before);
    assert_eq!(bvh.max_height(), height_before);
    assert_eq!(bvh.root_aabb().unwrap().mins.x, 0.5);
}

#[test]
fn refit_empty_tree() {
    let mut bvh = Bvh::new();
    bvh.refit(&mut BvhWorkspace::default());
    assert!(bvh.is_empty());
}
