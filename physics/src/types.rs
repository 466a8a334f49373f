/*!
Math aliases and small value types shared by every physics module.

This module intentionally contains no algorithms. It defines:
- the scalar and vector aliases used across colliders, bodies and the solver
- `BodyId`, the index handle into a body slice
- `Axis`, the body-local axis selector used by joints

Notes
- Everything is double precision. The solver skips corrections whose error
  is at most 1e-50, which only makes sense with `f64`.
- A `BodyId` is only meaningful for the slice (or `PhysicsWorld`) it was
  issued for. Removing bodies invalidates every id after the removed slot.
*/

use nalgebra as na;

/// Scalar type used for every physical quantity.
pub type Real = f64;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<Real>;
pub type Quat = na::UnitQuaternion<Real>;
pub type Mat3 = na::Matrix3<Real>;

/// Index of a body inside the slice handed to the solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub usize);

impl BodyId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for BodyId {
    #[inline]
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// A signed body-local axis.
///
/// Joints reference axes by name rather than by vector so that a joint
/// description stays valid when the body is rotated before simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl Axis {
    /// Unit vector of this axis in body-local coordinates.
    #[inline]
    pub fn local(self) -> Vec3 {
        match self {
            Axis::PositiveX => Vec3::x(),
            Axis::NegativeX => -Vec3::x(),
            Axis::PositiveY => Vec3::y(),
            Axis::NegativeY => -Vec3::y(),
            Axis::PositiveZ => Vec3::z(),
            Axis::NegativeZ => -Vec3::z(),
        }
    }

    /// This axis rotated into world space by `rotation`.
    #[inline]
    pub fn in_world(self, rotation: &Quat) -> Vec3 {
        rotation * self.local()
    }
}

/// Build a unit quaternion from a raw, possibly non-normalized quaternion.
#[inline]
pub(crate) fn renormalize(q: na::Quaternion<Real>) -> Quat {
    Quat::new_normalize(q)
}

/// First-order rotation update `q + 0.5 * [v, 0] * q`, renormalized.
///
/// `v` is a world-space rotation vector (axis times angle).
#[inline]
pub(crate) fn rotate_by(q: &Quat, v: &Vec3) -> Quat {
    let spin = na::Quaternion::from_imag(*v) * q.into_inner();
    renormalize(q.into_inner() + spin * 0.5)
}

/// Rotation vector (axis times angle, small-angle form) of `q`,
/// taking the short way around.
#[inline]
pub(crate) fn rotation_vector(q: &Quat) -> Vec3 {
    let imag = q.quaternion().imag() * 2.0;
    if q.quaternion().scalar() >= 0.0 { imag } else { -imag }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn axis_in_world_follows_rotation() {
        let rot = Quat::from_axis_angle(&Vec3::z_axis(), std::f64::consts::FRAC_PI_2);

        // +X rotated a quarter turn about Z lands on +Y.
        assert_relative_eq!(Axis::PositiveX.in_world(&rot), Vec3::y(), epsilon = 1e-12);
        assert_relative_eq!(Axis::NegativeY.in_world(&rot), Vec3::x(), epsilon = 1e-12);
    }

    #[test]
    fn rotate_by_small_vector_matches_exact_rotation() {
        let q = Quat::identity();
        let v = Vec3::new(0.0, 1e-3, 0.0);

        let approx = rotate_by(&q, &v);
        let exact = Quat::from_scaled_axis(v);

        assert!(approx.angle_to(&exact) < 1e-8);
    }

    #[test]
    fn rotation_vector_takes_short_way_around() {
        let q = Quat::from_scaled_axis(Vec3::new(0.0, 0.0, 0.1));
        let flipped = Quat::new_unchecked(-q.into_inner());

        // Both encodings of the same rotation give the same vector.
        assert_relative_eq!(rotation_vector(&q), rotation_vector(&flipped), epsilon = 1e-12);
        assert!(rotation_vector(&q).z > 0.0);
    }

    #[test]
    fn body_id_round_trips_through_usize() {
        let id = BodyId::from(7);
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "body#7");
    }
}
