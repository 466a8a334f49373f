/*!
GJK intersection test.

Works on the Minkowski difference `A - B`: the colliders overlap exactly
when it contains the origin. A simplex of up to four support points is
grown toward the origin. After each new point the simplex is reduced to
the feature closest to the origin, and the next search direction points
from that feature toward the origin.

On overlap the terminating tetrahedron is returned so EPA can start from it.
*/

use log::trace;

use crate::collider::Collider;
use crate::collision::support::minkowski_support;
use crate::error::NarrowPhaseError;
use crate::types::{Real, Vec3};

/// Iteration cap; hitting it counts as "no collision".
pub const GJK_MAX_ITERATIONS: usize = 100;

/// Search directions shorter than this mean the origin sits on the simplex.
const DEGENERATE_DIRECTION_SQ: Real = 1.0e-20;

/// Minimum distance of a support point from the segment or triangle it
/// extends when the simplex is grown around an origin lying on it.
const MIN_ENCLOSING_OFFSET: Real = 1.0e-9;

/// Up to four points of the Minkowski difference. `points[0]` is the newest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Simplex {
    points: [Vec3; 4],
    len: usize,
}

impl Simplex {
    fn single(p: Vec3) -> Self {
        Self {
            points: [p, Vec3::zeros(), Vec3::zeros(), Vec3::zeros()],
            len: 1,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_points(points: [Vec3; 4]) -> Self {
        Self { points, len: 4 }
    }

    fn push_front(&mut self, p: Vec3) {
        self.points.copy_within(0..3, 1);
        self.points[0] = p;
        self.len = (self.len + 1).min(4);
    }

    fn keep(&mut self, picked: &[Vec3]) {
        self.points[..picked.len()].copy_from_slice(picked);
        self.len = picked.len();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn points(&self) -> &[Vec3] {
        &self.points[..self.len]
    }
}

/// Run GJK on two colliders.
///
/// Returns the enclosing tetrahedron when the colliders overlap and `None`
/// when they are separated or only touching. When the origin lands exactly
/// on a segment or triangle of the simplex, the simplex is grown into a
/// tetrahedron around it instead of searching further.
pub fn gjk(a: &Collider, b: &Collider) -> Result<Option<Simplex>, NarrowPhaseError> {
    let mut simplex = Simplex::single(minkowski_support(a, b, &Vec3::z()));
    let mut direction = -simplex.points[0];

    for iteration in 0..GJK_MAX_ITERATIONS {
        if direction.norm_squared() < DEGENERATE_DIRECTION_SQ {
            return enclose(a, b, simplex);
        }
        let next = minkowski_support(a, b, &direction);
        let reach = next.dot(&direction);
        if reach < 0.0 {
            return Ok(None);
        }
        // No support point beyond the current feature: the origin is on it.
        let feature = simplex
            .points()
            .iter()
            .map(|p| p.dot(&direction))
            .fold(Real::NEG_INFINITY, Real::max);
        if reach <= feature {
            return enclose(a, b, simplex);
        }
        simplex.push_front(next);

        let enclosed = match simplex.len {
            2 => line(&mut simplex, &mut direction),
            3 => triangle(&mut simplex, &mut direction),
            _ => tetrahedron(&mut simplex, &mut direction),
        };
        if enclosed {
            trace!("gjk: overlap after {} iterations", iteration + 1);
            return Ok(Some(simplex));
        }
    }
    Err(NarrowPhaseError::GjkDidNotConverge)
}

/// Grow a simplex whose segment or triangle contains the origin into a
/// tetrahedron, using support points off that feature.
///
/// A single point means the origin is itself a support point, so the
/// colliders only touch.
fn enclose(
    a: &Collider,
    b: &Collider,
    mut simplex: Simplex,
) -> Result<Option<Simplex>, NarrowPhaseError> {
    if simplex.len == 1 {
        return Ok(None);
    }
    if simplex.len == 2 {
        let [p, q, ..] = simplex.points;
        let axis = q - p;
        let u = perpendicular(&axis);
        let v = axis.cross(&u);
        let limit = MIN_ENCLOSING_OFFSET * MIN_ENCLOSING_OFFSET * axis.norm_squared();
        let off_line = [u, -u, v, -v]
            .iter()
            .map(|d| minkowski_support(a, b, d))
            .find(|s| (s - p).cross(&axis).norm_squared() > limit)
            .ok_or(NarrowPhaseError::Degenerate)?;
        simplex.push_front(off_line);
    }
    if simplex.len == 3 {
        let [p, q, r, _] = simplex.points;
        let normal = (q - p).cross(&(r - p));
        if normal.norm_squared() < DEGENERATE_DIRECTION_SQ {
            return Err(NarrowPhaseError::Degenerate);
        }
        let limit = MIN_ENCLOSING_OFFSET * normal.norm();
        let off_plane = [normal, -normal]
            .iter()
            .map(|d| minkowski_support(a, b, d))
            .find(|s| (s - p).dot(&normal).abs() > limit)
            .ok_or(NarrowPhaseError::Degenerate)?;
        simplex.push_front(off_plane);
    }
    trace!("gjk: origin on the simplex, grown to a tetrahedron");
    Ok(Some(simplex))
}

/// Some vector perpendicular to `v`.
fn perpendicular(v: &Vec3) -> Vec3 {
    let abs = v.abs();
    let other = if abs.x <= abs.y && abs.x <= abs.z {
        Vec3::x()
    } else if abs.y <= abs.z {
        Vec3::y()
    } else {
        Vec3::z()
    };
    v.cross(&other)
}

/// Boolean form of [`gjk`]; non-convergence counts as separated.
#[inline]
pub fn collides(a: &Collider, b: &Collider) -> bool {
    matches!(gjk(a, b), Ok(Some(_)))
}

/// `(a × b) × c`
#[inline]
fn triple(a: &Vec3, b: &Vec3, c: &Vec3) -> Vec3 {
    a.cross(b).cross(c)
}

fn line(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let [a, b, ..] = simplex.points;
    let ab = b - a;
    let ao = -a;

    if ab.dot(&ao) > 0.0 {
        *direction = triple(&ab, &ao, &ab);
    } else {
        simplex.keep(&[a]);
        *direction = ao;
    }
    false
}

fn triangle(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let [a, b, c, _] = simplex.points;
    let ab = b - a;
    let ac = c - a;
    let ao = -a;
    let abc = ab.cross(&ac);

    if abc.cross(&ac).dot(&ao) > 0.0 {
        if ac.dot(&ao) > 0.0 {
            simplex.keep(&[a, c]);
            *direction = triple(&ac, &ao, &ac);
        } else {
            simplex.keep(&[a, b]);
            return line(simplex, direction);
        }
    } else if ab.cross(&abc).dot(&ao) > 0.0 {
        simplex.keep(&[a, b]);
        return line(simplex, direction);
    } else if abc.dot(&ao) > 0.0 {
        *direction = abc;
    } else {
        // Origin below the triangle: flip winding so the normal faces it.
        simplex.keep(&[a, c, b]);
        *direction = -abc;
    }
    false
}

fn tetrahedron(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let [a, b, c, d] = simplex.points;
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    let ao = -a;

    if ab.cross(&ac).dot(&ao) > 0.0 {
        simplex.keep(&[a, b, c]);
        return triangle(simplex, direction);
    }
    if ac.cross(&ad).dot(&ao) > 0.0 {
        simplex.keep(&[a, c, d]);
        return triangle(simplex, direction);
    }
    if ad.cross(&ab).dot(&ao) > 0.0 {
        simplex.keep(&[a, d, b]);
        return triangle(simplex, direction);
    }
    true
}
