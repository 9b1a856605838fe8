use crate::unit_cube;
use na::Vector3;
use sdf_bvh3d::bounding_volume::BoundingVolume;
use sdf_bvh3d::partitioning::{Bvh, BvhLeafTracker, BvhTrackerConfig};

fn tracked_scene(margin: f32) -> (Bvh, BvhLeafTracker) {
    let mut bvh = Bvh::new();
    let mut tracker = BvhLeafTracker::new(BvhTrackerConfig { margin });

    for i in 0..8 {
        let _ = tracker.track(&mut bvh, i, unit_cube(i as f32 * 3.0)).unwrap();
    }

    (bvh, tracker)
}

#[test]
fn sub_margin_motion_keeps_structure() {
    let (mut bvh, mut tracker) = tracked_scene(0.5);
    let before = bvh.flatten();
    let node_before = bvh.leaf_node_index(3);

    for step in 1..=4 {
        let shift = step as f32 * 0.1;
        let moved = unit_cube(9.0).translated(&Vector3::new(shift, -shift, 0.0));
        assert!(!tracker.update(&mut bvh, 3, moved).unwrap());
    }

    assert_eq!(bvh.flatten(), before);
    assert_eq!(bvh.leaf_node_index(3), node_before);
}

#[test]
fn motion_past_margin_reinserts_once() {
    let (mut bvh, mut tracker) = tracked_scene(0.5);
    let frame: Vec<_> = (0..8)
        .map(|i| {
            let shift = if i == 5 { 0.75 } else { 0.25 };
            (i, unit_cube(i as f32 * 3.0).translated(&Vector3::new(shift, 0.0, 0.0)))
        })
        .collect();

    assert_eq!(tracker.update_all(&mut bvh, frame.iter().copied()).unwrap(), 1);
    bvh.assert_well_formed();
    bvh.assert_balanced();
    assert_eq!(bvh.leaf_count(), 8);

    let fat = tracker.get(5).unwrap().fat_aabb;
    assert_eq!(bvh.leaf_node(5).unwrap().aabb(), fat);
    assert!(fat.contains(&frame[5].1));

    // The same frame again is entirely absorbed by the new margins.
    assert_eq!(tracker.update_all(&mut bvh, frame).unwrap(), 0);
}
