/*!
XPBD correction primitives.

Every constraint funnels through two pairs of functions:
- positional: an error vector `delta_x` (how far body 1's attachment point
  sits from where it should be relative to body 2), lever arms `r1`, `r2`
- angular: an error rotation vector (how far body 1 is rotated relative to
  its target, axis times angle)

Each pair first computes `Δλ = (-C - α̃λ) / (w1 + w2 + α̃)` with
`α̃ = compliance / h²`, then applies the correction. Fixed bodies have zero
generalized inverse mass and are never written.
*/

use crate::body::Body;
use crate::settings::CONSTRAINT_EPSILON;
use crate::types::{BodyId, Mat3, Real, Vec3, rotate_by};

/// World-space lever arms from each body's center to the attachment point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Arms {
    pub r1: Vec3,
    pub r2: Vec3,
}

impl Arms {
    /// Rotate body-local attachment points into world space.
    #[inline]
    pub fn from_local(b1: &Body, b2: &Body, r1_local: &Vec3, r2_local: &Vec3) -> Self {
        Self {
            r1: b1.rotation * r1_local,
            r2: b2.rotation * r2_local,
        }
    }

    /// World-space attachment points.
    #[inline]
    pub fn points(&self, b1: &Body, b2: &Body) -> (Vec3, Vec3) {
        (b1.position + self.r1, b2.position + self.r2)
    }
}

/// Compliance scaled to the substep: `α̃ = α / h²`.
#[inline]
pub(crate) fn compliance_term(compliance: Real, h: Real) -> Real {
    compliance / (h * h)
}

/// `w = m⁻¹ + (r × n)ᵀ I⁻¹ (r × n)`, zero for fixed bodies.
#[inline]
pub(crate) fn generalized_inverse_mass(body: &Body, inv_inertia: &Mat3, r: &Vec3, n: &Vec3) -> Real {
    if body.is_fixed() {
        return 0.0;
    }
    let rn = r.cross(n);
    body.inverse_mass + rn.dot(&(inv_inertia * rn))
}

#[inline]
fn angular_inverse_mass(body: &Body, inv_inertia: &Mat3, n: &Vec3) -> Real {
    if body.is_fixed() {
        return 0.0;
    }
    n.dot(&(inv_inertia * n))
}

/// Multiplier increment for a positional error.
pub(crate) fn positional_delta_lambda(
    b1: &Body,
    b2: &Body,
    arms: &Arms,
    delta_x: &Vec3,
    alpha: Real,
    lambda: Real,
) -> Real {
    let c = delta_x.norm();
    if c <= CONSTRAINT_EPSILON {
        return 0.0;
    }
    let n = delta_x / c;
    let w1 = generalized_inverse_mass(b1, &b1.world_inverse_inertia(), &arms.r1, &n);
    let w2 = generalized_inverse_mass(b2, &b2.world_inverse_inertia(), &arms.r2, &n);
    let denom = w1 + w2 + alpha;
    if denom <= CONSTRAINT_EPSILON {
        return 0.0;
    }
    (-c - alpha * lambda) / denom
}

/// Move both bodies by the impulse `Δλ · n` applied at their lever arms.
pub(crate) fn apply_positional(
    b1: &mut Body,
    b2: &mut Body,
    arms: &Arms,
    delta_x: &Vec3,
    delta_lambda: Real,
) {
    let c = delta_x.norm();
    if c <= CONSTRAINT_EPSILON || delta_lambda == 0.0 {
        return;
    }
    let impulse = delta_x / c * delta_lambda;

    if !b1.is_fixed() {
        let spin = b1.world_inverse_inertia() * arms.r1.cross(&impulse);
        b1.position += impulse * b1.inverse_mass;
        b1.rotation = rotate_by(&b1.rotation, &spin);
    }
    if !b2.is_fixed() {
        let spin = b2.world_inverse_inertia() * arms.r2.cross(&impulse);
        b2.position -= impulse * b2.inverse_mass;
        b2.rotation = rotate_by(&b2.rotation, &-spin);
    }
}

/// Multiplier increment for an angular error.
pub(crate) fn angular_delta_lambda(
    b1: &Body,
    b2: &Body,
    error: &Vec3,
    alpha: Real,
    lambda: Real,
) -> Real {
    let theta = error.norm();
    if theta <= CONSTRAINT_EPSILON {
        return 0.0;
    }
    let n = error / theta;
    let w1 = angular_inverse_mass(b1, &b1.world_inverse_inertia(), &n);
    let w2 = angular_inverse_mass(b2, &b2.world_inverse_inertia(), &n);
    let denom = w1 + w2 + alpha;
    if denom <= CONSTRAINT_EPSILON {
        return 0.0;
    }
    (-theta - alpha * lambda) / denom
}

/// Rotate both bodies by the angular impulse `Δλ · n`.
pub(crate) fn apply_angular(b1: &mut Body, b2: &mut Body, error: &Vec3, delta_lambda: Real) {
    let theta = error.norm();
    if theta <= CONSTRAINT_EPSILON || delta_lambda == 0.0 {
        return;
    }
    let impulse = error / theta * delta_lambda;

    if !b1.is_fixed() {
        let spin = b1.world_inverse_inertia() * impulse;
        b1.rotation = rotate_by(&b1.rotation, &spin);
    }
    if !b2.is_fixed() {
        let spin = b2.world_inverse_inertia() * impulse;
        b2.rotation = rotate_by(&b2.rotation, &-spin);
    }
}

/// Mutable access to two distinct bodies of a slice.
pub(crate) fn pair_mut(
    bodies: &mut [Body],
    a: BodyId,
    b: BodyId,
) -> Option<(&mut Body, &mut Body)> {
    let (i, j) = (a.index(), b.index());
    if i == j || i >= bodies.len() || j >= bodies.len() {
        return None;
    }
    if i < j {
        let (lo, hi) = bodies.split_at_mut(j);
        Some((&mut lo[i], &mut hi[0]))
    } else {
        let (lo, hi) = bodies.split_at_mut(i);
        Some((&mut hi[0], &mut lo[j]))
    }
}
