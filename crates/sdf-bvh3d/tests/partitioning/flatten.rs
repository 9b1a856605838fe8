use crate::unit_cube;
use na::{Point3, Vector3};
use sdf_bvh3d::bounding_volume::Aabb;
use sdf_bvh3d::partitioning::{Bvh, BvhBuildStrategy, BvhWorkspace, FlatBvhNode};
use sdf_bvh3d::query::Ray;

fn check_round_trip(bvh: &Bvh) {
    let flat = bvh.flatten();
    assert_eq!(flat.len(), bvh.node_count());

    let mut ids: Vec<_> = flat.as_slice().iter().filter_map(|n| n.leaf_id()).collect();
    ids.sort_unstable();
    let mut expected: Vec<_> = bvh.leaf_ids().collect();
    expected.sort_unstable();
    assert_eq!(ids, expected);

    for (i, node) in flat.as_slice().iter().enumerate() {
        if let Some([left, right]) = node.children() {
            assert!(left > i && right == left + 1 && right < flat.len());
            assert_eq!(node.leaf_id, FlatBvhNode::NO_LEAF);
        } else {
            assert_eq!(node.child_offset, -1);
            let leaf = bvh.leaf_node(node.leaf_id).unwrap();
            assert_eq!(node.aabb(), leaf.aabb());
        }
    }
}

#[test]
fn flatten_round_trip() {
    let mut bvh = Bvh::new();
    check_round_trip(&bvh);

    for i in 0..50 {
        let x = (i * 13 % 50) as f32 * 1.5;
        let _ = bvh.insert(unit_cube(x), i).unwrap();
        check_round_trip(&bvh);
    }

    for i in (0..50).step_by(3) {
        let _ = bvh.remove(i).unwrap();
        check_round_trip(&bvh);
    }
}

#[test]
fn flatten_disjoint_triple() {
    let mut bvh = Bvh::new();
    let _ = bvh.insert(unit_cube(0.0), 0).unwrap();
    let _ = bvh.insert(unit_cube(5.0), 1).unwrap();
    let _ = bvh.insert(unit_cube(10.0), 2).unwrap();

    let flat = bvh.flatten();
    let nodes = flat.as_slice();
    assert_eq!(nodes.len(), 5);
    assert_eq!(nodes[0].child_offset, 1);
    assert_eq!(nodes[0].mins, [0.0; 3]);
    assert_eq!(nodes[0].maxs, [11.0, 1.0, 1.0]);

    // The root pairs the internal node (A, B) with the leaf C.
    assert_eq!(nodes[1].child_offset, 3);
    assert_eq!(nodes[2].leaf_id(), Some(2));
    assert_eq!(nodes[3].leaf_id(), Some(0));
    assert_eq!(nodes[4].leaf_id(), Some(1));
}

#[test]
fn flatten_into_reuses_buffers() {
    let leaves: Vec<_> = (0..20).map(|i| unit_cube(i as f32 * 2.0)).collect();
    let bvh = Bvh::from_leaves(BvhBuildStrategy::Median, &leaves).unwrap();
    let mut workspace = BvhWorkspace::default();
    let mut out = Vec::new();

    bvh.flatten_into(&mut workspace, &mut out);
    assert_eq!(out.len(), 39);
    bvh.flatten_into(&mut workspace, &mut out);
    assert_eq!(out, bvh.flatten().into_vec());
}

#[test]
fn flat_traversal_agrees_with_tree() {
    let leaves: Vec<_> = (0..64)
        .map(|i| {
            let x = (i % 8) as f32 * 2.0;
            let y = (i / 8) as f32 * 2.0;
            Aabb::new(Point3::new(x, y, 0.0), Point3::new(x + 1.0, y + 1.0, 1.0))
        })
        .collect();
    let bvh = Bvh::from_leaves(BvhBuildStrategy::Midpoint, &leaves).unwrap();
    let flat = bvh.flatten();

    let region = Aabb::new(Point3::new(1.5, 1.5, 0.0), Point3::new(6.5, 4.5, 1.0));
    let mut from_tree: Vec<_> = bvh.intersect_aabb(&region).collect();
    let mut from_flat = flat.leaves_intersecting_aabb(&region);
    from_tree.sort_unstable();
    from_flat.sort_unstable();
    assert_eq!(from_tree, from_flat);
    assert_eq!(from_flat.len(), 6);

    // A ray along the diagonal of the grid.
    let ray = Ray::new(Point3::new(-1.0, -1.0, 0.5), Vector3::new(1.0, 1.0, 0.0));
    let mut hits = flat.leaves_intersecting_ray(&ray, 100.0);
    hits.sort_unstable();
    assert_eq!(hits, [0, 9, 18, 27, 36, 45, 54, 63]);
}
