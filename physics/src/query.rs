//! Ray casting against bodies.
//!
//! Separate from contact generation. Mostly used to answer "what is the
//! user pointing at". Rays that start inside a collider do not hit it.

use crate::body::Body;
use crate::collider::{Collider, HullCollider, SphereCollider};
use crate::types::{BodyId, Real, Vec3};

/// Directions shorter than this cannot be normalized.
const MIN_DIRECTION: Real = 1.0e-12;

/// Nearest intersection of a ray with a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub body: BodyId,
    /// World-space hit point.
    pub point: Vec3,
    /// Outward surface normal at the hit point.
    pub normal: Vec3,
    /// Distance along the normalized ray direction.
    pub distance: Real,
}

/// Nearest body hit by the ray within `max_distance`.
///
/// Colliders are read from their cached world-space copies, which the
/// solver refreshes at the end of every step.
pub fn cast_ray(
    bodies: &[Body],
    origin: &Vec3,
    direction: &Vec3,
    max_distance: Real,
) -> Option<RayHit> {
    let len = direction.norm();
    if len < MIN_DIRECTION {
        return None;
    }
    let dir = direction / len;

    let mut best: Option<RayHit> = None;
    for (index, body) in bodies.iter().enumerate() {
        for collider in body.colliders() {
            let Some((distance, normal)) = cast_collider(collider, origin, &dir) else {
                continue;
            };
            if distance > max_distance || best.is_some_and(|hit| hit.distance <= distance) {
                continue;
            }
            best = Some(RayHit {
                body: BodyId(index),
                point: origin + dir * distance,
                normal,
                distance,
            });
        }
    }
    best
}

fn cast_collider(collider: &Collider, origin: &Vec3, dir: &Vec3) -> Option<(Real, Vec3)> {
    match collider {
        Collider::Sphere(sphere) => cast_sphere(sphere, origin, dir),
        Collider::Hull(hull) => cast_hull(hull, origin, dir),
    }
}

fn cast_sphere(sphere: &SphereCollider, origin: &Vec3, dir: &Vec3) -> Option<(Real, Vec3)> {
    let to_center = sphere.center() - origin;
    let along = dir.dot(&to_center);
    if along < 0.0 {
        return None;
    }
    let radius_sq = sphere.radius * sphere.radius;
    let off_axis_sq = to_center.norm_squared() - along * along;
    if off_axis_sq > radius_sq || to_center.norm_squared() < radius_sq {
        return None;
    }
    let distance = along - (radius_sq - off_axis_sq).sqrt();
    let normal = (origin + dir * distance - sphere.center()) / sphere.radius;
    Some((distance, normal))
}

/// Slab test over the face planes of a convex hull.
fn cast_hull(hull: &HullCollider, origin: &Vec3, dir: &Vec3) -> Option<(Real, Vec3)> {
    let mut enter = Real::NEG_INFINITY;
    let mut exit = Real::INFINITY;
    let mut enter_normal = None;

    for (f, face) in hull.faces().iter().enumerate() {
        let normal = hull.world_normal(f);
        let on_plane = hull.world_vertices()[*face.elements.first()?];
        let height = normal.dot(&(origin - on_plane));
        let rate = normal.dot(dir);

        if rate.abs() < MIN_DIRECTION {
            if height > 0.0 {
                return None;
            }
            continue;
        }
        let t = -height / rate;
        if rate < 0.0 {
            if t > enter {
                enter = t;
                enter_normal = Some(normal);
            }
        } else {
            exit = exit.min(t);
        }
        if enter > exit {
            return None;
        }
    }

    if enter < 0.0 {
        return None;
    }
    enter_normal.map(|normal| (enter, normal))
}
