//! Collision engine tests: overlap areas, shape fast paths, normal
//! estimation, and solid-body separation.

use playfield_core::collision::{
    colliders_overlap, collision_normal, mask_overlap, solid_displacement, Collider,
    CollisionShape, Mask, Rect,
};

fn collider(mask: &Mask, shape: CollisionShape, x: i64, y: i64) -> Collider<'_> {
    let (w, h) = (mask.width() as i64, mask.height() as i64);
    Collider {
        shape,
        rect: Rect::new(x, y, w, h),
        radius: w.min(h) as f64 / 2.0,
        mask,
    }
}

#[test]
fn overlap_area_counts_shared_set_pixels() {
    let a = Mask::filled(4, 4);
    let b = Mask::filled(4, 4);
    assert_eq!(16, a.overlap_area(&b, (0, 0)));
    assert_eq!(8, a.overlap_area(&b, (2, 0)));
    assert_eq!(4, a.overlap_area(&b, (2, 2)));
    assert_eq!(0, a.overlap_area(&b, (4, 0)), "touching edges do not overlap");
    assert_eq!(0, a.overlap_area(&b, (-5, 0)));
}

#[test]
fn mask_rows_shape_masks_respect_holes() {
    let a = Mask::from_rows(&["##", "#."]);
    let b = Mask::filled(2, 2);
    assert_eq!(3, a.overlap_area(&b, (0, 0)));
    assert_eq!(1, a.overlap_area(&b, (1, 0)), "hole at (1,1) does not count");
}

#[test]
fn rectangle_pair_uses_the_aabb_test() {
    let mask = Mask::filled(4, 4);
    let a = collider(&mask, CollisionShape::Rectangle, 0, 0);
    let b = collider(&mask, CollisionShape::Rectangle, 3, 3);
    let c = collider(&mask, CollisionShape::Rectangle, 4, 0);
    assert!(colliders_overlap(&a, &b));
    assert!(!colliders_overlap(&a, &c), "abutting rectangles do not collide");
}

#[test]
fn disk_pair_uses_the_distance_test() {
    let mask = Mask::disk(8);
    let a = collider(&mask, CollisionShape::Disk, 0, 0);
    // centers 8 apart horizontally: exactly touching (radius 4 + 4)
    let b = collider(&mask, CollisionShape::Disk, 8, 0);
    assert!(colliders_overlap(&a, &b));
    let c = collider(&mask, CollisionShape::Disk, 9, 0);
    assert!(!colliders_overlap(&a, &c));
}

#[test]
fn mismatched_shapes_fall_back_to_mask_overlap() {
    // a disk and a rectangle whose corners overlap but whose masks do not
    let disk_mask = Mask::disk(8);
    let rect_mask = Mask::filled(8, 8);
    let disk = collider(&disk_mask, CollisionShape::Disk, 0, 0);
    let rect = collider(&rect_mask, CollisionShape::Rectangle, 7, 7);
    // rects overlap by one pixel at the disk's empty corner
    assert!(disk.rect.overlaps(&rect.rect));
    assert!(
        !colliders_overlap(&disk, &rect),
        "mask fallback must notice the disk's empty corner"
    );
}

#[test]
fn normal_points_against_the_overlap_gradient() {
    let mask = Mask::filled(4, 4);
    // b sits to a's right, overlapping two columns
    let a = collider(&mask, CollisionShape::Precise, 0, 0);
    let b = collider(&mask, CollisionShape::Precise, 2, 0);
    assert_eq!(8, mask_overlap(&a, &b));
    let normal = collision_normal(&a, &b).expect("overlapping bodies have a normal");
    assert_eq!((-8, 0), normal, "x difference only, pointing away from b");

    // flipped perspective: same magnitude, opposite sign
    let flipped = collision_normal(&b, &a).expect("normal");
    assert_eq!((8, 0), flipped);
}

#[test]
fn overlap_is_symmetric() {
    let a_mask = Mask::from_rows(&["###", "##.", "#.."]);
    let b_mask = Mask::filled(3, 3);
    let a = collider(&a_mask, CollisionShape::Precise, 0, 0);
    let b = collider(&b_mask, CollisionShape::Precise, 1, 1);
    assert_eq!(mask_overlap(&a, &b), mask_overlap(&b, &a));
}

#[test]
fn contained_body_has_no_normal() {
    let big = Mask::filled(10, 10);
    let small = Mask::filled(2, 2);
    let a = collider(&big, CollisionShape::Precise, 0, 0);
    let b = collider(&small, CollisionShape::Precise, 4, 4);
    assert!(mask_overlap(&a, &b) > 0);
    assert_eq!(
        None,
        collision_normal(&a, &b),
        "a body fully inside another reports no normal"
    );
}

#[test]
fn solid_displacement_pushes_along_the_normal() {
    // overlap 8 pixels, normal (-8, 0): distance 8/64 + 0.5 = 0.625,
    // displacement floor(0.625 * -8 + 0.5) = -5
    assert_eq!(Some((-5, 0)), solid_displacement(8, (-8, 0)));
    // degenerate normal: no displacement rather than a division by zero
    assert_eq!(None, solid_displacement(8, (0, 0)));
}

#[test]
fn disk_mask_is_inscribed() {
    let mask = Mask::disk(8);
    assert!(mask.get(4, 4), "center is set");
    assert!(!mask.get(0, 0), "corner is empty");
    assert!(mask.get(0, 4), "edge midpoint is set");
}
