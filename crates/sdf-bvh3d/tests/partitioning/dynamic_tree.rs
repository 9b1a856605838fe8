use crate::unit_cube;
use na::Point3;
use sdf_bvh3d::bounding_volume::{Aabb, BoundingVolume};
use sdf_bvh3d::partitioning::{Bvh, BvhError};

fn disjoint_triple() -> Bvh {
    let mut bvh = Bvh::new();
    let _ = bvh.insert(unit_cube(0.0), 0).unwrap();
    let _ = bvh.insert(unit_cube(5.0), 1).unwrap();
    let _ = bvh.insert(unit_cube(10.0), 2).unwrap();
    bvh
}

#[test]
fn disjoint_triple_insertion() {
    let bvh = disjoint_triple();
    bvh.assert_well_formed();
    bvh.assert_balanced();

    assert_eq!(bvh.leaf_count(), 3);
    assert_eq!(bvh.node_count(), 5);
    assert_eq!(bvh.reachable_node_count(), 5);
    assert_eq!(bvh.max_height(), 2);
    assert_eq!(
        bvh.root_aabb(),
        Some(Aabb::new(Point3::origin(), Point3::new(11.0, 1.0, 1.0)))
    );

    // The third box is paired with the root: union(A, B) + union(A, B, C).
    assert_eq!(bvh.calculate_cost(), 13.0 + 23.0);
}

#[test]
fn remove_middle_of_three() {
    let mut bvh = disjoint_triple();
    assert_eq!(bvh.remove(1), Ok(unit_cube(5.0)));
    bvh.assert_well_formed();

    assert_eq!(bvh.node_count(), 3);
    assert_eq!(bvh.max_height(), 1);

    let root = bvh.node(bvh.root().unwrap()).unwrap();
    assert!(!root.is_leaf());
    assert_eq!(root.aabb(), unit_cube(0.0).merged(&unit_cube(10.0)));

    let mut leaves = bvh.depth_first_leaves();
    leaves.sort_unstable();
    assert_eq!(leaves, [0, 2]);
}

#[test]
fn remove_last_leaf_empties_the_tree() {
    let mut bvh = Bvh::new();
    let _ = bvh.insert(unit_cube(0.0), 4).unwrap();
    assert_eq!(bvh.max_height(), 0);
    assert_eq!(bvh.node_count(), 1);

    assert_eq!(bvh.remove(4), Ok(unit_cube(0.0)));
    assert!(bvh.is_empty());
    assert_eq!(bvh.root(), None);
    assert_eq!(bvh.root_aabb(), None);
    assert_eq!(bvh.calculate_cost(), 0.0);
    assert_eq!(bvh.remove(4), Err(BvhError::NodeNotFound { leaf: 4 }));
}

#[test]
fn sorted_insertions_stay_balanced() {
    let mut bvh = Bvh::new();

    for i in 0..1024 {
        let _ = bvh.insert(unit_cube(i as f32 * 2.0), i).unwrap();
    }

    bvh.assert_well_formed();
    bvh.assert_balanced();
    assert_eq!(bvh.node_count(), 2047);
    // An AVL tree with n leaves is at most ~1.44 log2(n) high.
    assert!(bvh.max_height() <= 15, "height: {}", bvh.max_height());
}

#[test]
fn update_bounds_moves_leaf() {
    let mut bvh = disjoint_triple();
    let node = bvh.update_bounds(unit_cube(20.0), 0).unwrap();
    bvh.assert_well_formed();

    assert_eq!(bvh.leaf_node_index(0), Some(node));
    assert_eq!(bvh.leaf_node(0).unwrap().aabb(), unit_cube(20.0));
    assert_eq!(
        bvh.root_aabb(),
        Some(Aabb::new(Point3::new(5.0, 0.0, 0.0), Point3::new(21.0, 1.0, 1.0)))
    );
    assert_eq!(
        bvh.update_bounds(unit_cube(0.0), 9),
        Err(BvhError::NodeNotFound { leaf: 9 })
    );
}

#[test]
fn debug_tree_lists_every_node() {
    let bvh = disjoint_triple();
    let text = bvh.debug_tree().to_string();
    assert_eq!(text.lines().count(), 5);
    assert_eq!(text.matches("leaf").count(), 3);
    // Root first, without indentation.
    assert!(text.starts_with('#'));
    assert!(text.lines().skip(1).all(|line| line.starts_with("  ")));

    assert_eq!(Bvh::new().debug_tree().to_string(), "<empty>\n");
}

#[test]
fn queries_on_dynamic_tree() {
    let bvh = disjoint_triple();
    let region = Aabb::new(Point3::new(0.5, 0.0, 0.0), Point3::new(5.5, 1.0, 1.0));
    let mut found: Vec<_> = bvh.intersect_aabb(&region).collect();
    found.sort_unstable();
    assert_eq!(found, [0, 1]);

    let all: Vec<_> = bvh.leaves(|_| true).collect();
    assert_eq!(all.len(), 3);
    assert_eq!(all, bvh.depth_first_leaves());
}
