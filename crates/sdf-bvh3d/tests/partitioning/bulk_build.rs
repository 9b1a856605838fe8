use crate::unit_cube;
use sdf_bvh3d::partitioning::{Bvh, BvhBuildStrategy, BvhWorkspace};

fn evenly_spaced(n: usize) -> Vec<sdf_bvh3d::bounding_volume::Aabb> {
    (0..n).map(|i| unit_cube(i as f32 * 2.0)).collect()
}

#[test]
fn bulk_build_of_eight_boxes() {
    let leaves = evenly_spaced(8);

    for strategy in [BvhBuildStrategy::Midpoint, BvhBuildStrategy::Median] {
        let bvh = Bvh::from_leaves(strategy, &leaves).unwrap();
        bvh.assert_well_formed();
        bvh.assert_balanced();

        assert_eq!(bvh.max_height(), 3);
        assert_eq!(bvh.node_count(), 15);
        assert_eq!(bvh.leaf_count(), 8);

        // Spatially sorted leaves end up in order.
        assert_eq!(bvh.depth_first_leaves(), (0..8).collect::<Vec<_>>());
    }
}

#[test]
fn bulk_build_beats_sorted_insertions() {
    let leaves = evenly_spaced(256);
    let built = Bvh::from_leaves(BvhBuildStrategy::Midpoint, &leaves).unwrap();

    let mut inserted = Bvh::new();
    for (i, aabb) in leaves.iter().enumerate() {
        let _ = inserted.insert(*aabb, i as u32).unwrap();
    }

    assert_eq!(built.root_aabb(), inserted.root_aabb());
    assert!(built.calculate_cost() <= inserted.calculate_cost());
}

#[test]
fn from_iter_keeps_custom_ids() {
    let bvh = Bvh::from_iter(
        BvhBuildStrategy::Median,
        [(10, unit_cube(0.0)), (20, unit_cube(3.0)), (30, unit_cube(6.0))],
    )
    .unwrap();
    bvh.assert_well_formed();

    assert!(bvh.contains_leaf(20));
    assert!(!bvh.contains_leaf(1));
    assert_eq!(bvh.leaf_node(30).unwrap().aabb(), unit_cube(6.0));
}

#[test]
fn built_tree_supports_incremental_updates() {
    let mut bvh = Bvh::from_leaves(BvhBuildStrategy::Median, &evenly_spaced(100)).unwrap();
    let mut workspace = BvhWorkspace::default();

    for i in (0..100).step_by(2) {
        let _ = bvh.remove(i).unwrap();
    }
    for i in 100..150 {
        let _ = bvh.insert(unit_cube(i as f32 * 2.0), i).unwrap();
    }
    bvh.assert_well_formed();
    bvh.assert_balanced();

    bvh.rebuild(&mut workspace, BvhBuildStrategy::Median);
    bvh.assert_well_formed();
    bvh.assert_balanced();
    assert_eq!(bvh.leaf_count(), 100);
    assert_eq!(bvh.max_height(), 7);
}
