//! Support mappings over the world-space collider copies.

use crate::collider::{Collider, HullCollider};
use crate::types::{Real, Vec3};

/// Directions shorter than this carry no usable orientation.
const MIN_DIRECTION_NORM: Real = 1.0e-12;

/// Farthest point of `collider` along `direction`.
#[inline]
pub fn support_point(collider: &Collider, direction: &Vec3) -> Vec3 {
    match collider {
        Collider::Sphere(s) => match direction.try_normalize(MIN_DIRECTION_NORM) {
            Some(d) => s.center() + d * s.radius,
            None => s.center(),
        },
        Collider::Hull(h) => h.world_vertices()[hull_support_index(h, direction)],
    }
}

/// Index of the hull vertex farthest along `direction`.
pub fn hull_support_index(hull: &HullCollider, direction: &Vec3) -> usize {
    let mut best = 0;
    let mut best_dot = Real::NEG_INFINITY;
    for (i, v) in hull.world_vertices().iter().enumerate() {
        let d = v.dot(direction);
        if d > best_dot {
            best_dot = d;
            best = i;
        }
    }
    best
}

/// Support point of the Minkowski difference `a - b`.
#[inline]
pub fn minkowski_support(a: &Collider, b: &Collider, direction: &Vec3) -> Vec3 {
    support_point(a, direction) - support_point(b, &-direction)
}
