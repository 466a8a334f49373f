/*!
Hinge and spherical joints.

Both joints pin an anchor on each body together and then restrict the
relative rotation through one or more angle limits. An angle limit measures
the signed angle between an axis of body 1 and an axis of body 2 around a
third axis, and when the angle leaves `[lower, upper]` produces an angular
error that rotates it back to the nearest bound.
*/

use std::f64::consts::PI;

use log::error;
use nalgebra::Unit;

use crate::body::Body;
use crate::error::PhysicsError;
use crate::settings::CONSTRAINT_EPSILON;
use crate::solver::base::{angular_delta_lambda, apply_angular, compliance_term};
use crate::solver::constraint::solve_anchor_link;
use crate::types::{Axis, Quat, Real, Vec3};

/// Angle window between an axis of body 1 and an axis of body 2.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngleLimit {
    pub axis1: Axis,
    pub axis2: Axis,
    pub lower: Real,
    pub upper: Real,
}

impl AngleLimit {
    /// Requires `-pi <= lower <= upper <= pi`.
    pub fn new(axis1: Axis, axis2: Axis, lower: Real, upper: Real) -> Result<Self, PhysicsError> {
        if !(-PI..=PI).contains(&lower) || !(-PI..=PI).contains(&upper) || lower > upper {
            let err = PhysicsError::InvalidJointLimits { lower, upper };
            error!("{err}");
            return Err(err);
        }
        Ok(Self {
            axis1,
            axis2,
            lower,
            upper,
        })
    }

    /// A limit that never engages.
    pub fn free(axis1: Axis, axis2: Axis) -> Self {
        Self {
            axis1,
            axis2,
            lower: -PI,
            upper: PI,
        }
    }
}

/// One rotational degree of freedom around an aligned axis pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HingeJoint {
    pub anchor1: Vec3,
    pub anchor2: Vec3,
    /// Hinge axis of body 1, kept parallel to `axis2`.
    pub axis1: Axis,
    pub axis2: Axis,
    /// Compliance of the axis alignment. Anchors and limits are rigid.
    pub compliance: Real,
    pub limit: Option<AngleLimit>,
    lambda_aligned: Real,
    lambda_position: Real,
    lambda_limit: Real,
}

impl HingeJoint {
    pub fn new(anchor1: Vec3, anchor2: Vec3, axis1: Axis, axis2: Axis, compliance: Real) -> Self {
        Self {
            anchor1,
            anchor2,
            axis1,
            axis2,
            compliance,
            limit: None,
            lambda_aligned: 0.0,
            lambda_position: 0.0,
            lambda_limit: 0.0,
        }
    }

    /// Restrict the hinge angle, measured between `limit.axis1` and
    /// `limit.axis2` around the hinge axis. Limit axes should be
    /// perpendicular to the hinge axis.
    pub fn with_limit(mut self, limit: AngleLimit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn reset_lambdas(&mut self) {
        self.lambda_aligned = 0.0;
        self.lambda_position = 0.0;
        self.lambda_limit = 0.0;
    }

    pub(crate) fn solve(&mut self, b1: &mut Body, b2: &mut Body, h: Real) {
        let a1 = self.axis1.in_world(&b1.rotation);
        let a2 = self.axis2.in_world(&b2.rotation);
        let misalignment = a2.cross(&a1);
        let alpha = compliance_term(self.compliance, h);
        let dl = angular_delta_lambda(b1, b2, &misalignment, alpha, self.lambda_aligned);
        apply_angular(b1, b2, &misalignment, dl);
        self.lambda_aligned += dl;

        solve_anchor_link(
            b1,
            b2,
            &self.anchor1,
            &self.anchor2,
            &Vec3::zeros(),
            0.0,
            &mut self.lambda_position,
        );

        let Some(limit) = self.limit else {
            return;
        };
        let n = self.axis1.in_world(&b1.rotation);
        let n1 = limit.axis1.in_world(&b1.rotation);
        let n2 = limit.axis2.in_world(&b2.rotation);
        if let Some(error) = limit_angle(&n, &n1, &n2, limit.lower, limit.upper) {
            let dl = angular_delta_lambda(b1, b2, &error, 0.0, self.lambda_limit);
            apply_angular(b1, b2, &error, dl);
            self.lambda_limit += dl;
        }
    }
}

/// Ball-and-socket joint with a swing cone and a twist window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphericalJoint {
    pub anchor1: Vec3,
    pub anchor2: Vec3,
    /// Angle between the two swing axes, in `[0, pi]`.
    pub swing: AngleLimit,
    /// Rotation of the twist axes around the mean swing axis.
    pub twist: AngleLimit,
    lambda_position: Real,
    lambda_swing: Real,
    lambda_twist: Real,
}

impl SphericalJoint {
    pub fn new(anchor1: Vec3, anchor2: Vec3, swing: AngleLimit, twist: AngleLimit) -> Self {
        Self {
            anchor1,
            anchor2,
            swing,
            twist,
            lambda_position: 0.0,
            lambda_swing: 0.0,
            lambda_twist: 0.0,
        }
    }

    pub(crate) fn reset_lambdas(&mut self) {
        self.lambda_position = 0.0;
        self.lambda_swing = 0.0;
        self.lambda_twist = 0.0;
    }

    /// Anchor and both limits are rigid.
    pub(crate) fn solve(&mut self, b1: &mut Body, b2: &mut Body) {
        solve_anchor_link(
            b1,
            b2,
            &self.anchor1,
            &self.anchor2,
            &Vec3::zeros(),
            0.0,
            &mut self.lambda_position,
        );

        let n1 = self.swing.axis1.in_world(&b1.rotation);
        let n2 = self.swing.axis2.in_world(&b2.rotation);
        if let Some(n) = normalized(n1.cross(&n2)) {
            if let Some(error) = limit_angle(&n, &n1, &n2, self.swing.lower, self.swing.upper) {
                let dl = angular_delta_lambda(b1, b2, &error, 0.0, self.lambda_swing);
                apply_angular(b1, b2, &error, dl);
                self.lambda_swing += dl;
            }
        }

        let a1 = self.swing.axis1.in_world(&b1.rotation);
        let a2 = self.swing.axis2.in_world(&b2.rotation);
        let Some(n) = normalized(a1 + a2) else {
            return;
        };
        let z1 = self.twist.axis1.in_world(&b1.rotation);
        let z2 = self.twist.axis2.in_world(&b2.rotation);
        let (Some(n1), Some(n2)) = (
            normalized(z1 - n * n.dot(&z1)),
            normalized(z2 - n * n.dot(&z2)),
        ) else {
            return;
        };
        if let Some(error) = limit_angle(&n, &n1, &n2, self.twist.lower, self.twist.upper) {
            let dl = angular_delta_lambda(b1, b2, &error, 0.0, self.lambda_twist);
            apply_angular(b1, b2, &error, dl);
            self.lambda_twist += dl;
        }
    }
}

fn normalized(v: Vec3) -> Option<Vec3> {
    let len = v.norm();
    (len > CONSTRAINT_EPSILON).then(|| v / len)
}

/// Signed angle from `n1` to `n2` around the unit axis `n`, in `[-pi, pi]`.
pub(crate) fn signed_angle(n: &Vec3, n1: &Vec3, n2: &Vec3) -> Real {
    let mut phi = n.dot(&n1.cross(n2)).clamp(-1.0, 1.0).asin();
    // asin only covers the acute half.
    if n1.dot(n2) < 0.0 {
        phi = PI - phi;
    }
    if phi > PI {
        phi -= 2.0 * PI;
    }
    phi
}

/// Angular error that brings the angle from `n1` to `n2` around `n` back
/// into `[lower, upper]`, or `None` while it is inside.
pub(crate) fn limit_angle(
    n: &Vec3,
    n1: &Vec3,
    n2: &Vec3,
    lower: Real,
    upper: Real,
) -> Option<Vec3> {
    let phi = signed_angle(n, n1, n2);
    if (lower..=upper).contains(&phi) {
        return None;
    }
    let bound = Quat::from_axis_angle(&Unit::new_normalize(*n), phi.clamp(lower, upper));
    let target = bound * n1;
    Some(n2.cross(&target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn about(axis: Vec3, angle: Real) -> Quat {
        Quat::from_axis_angle(&Unit::new_normalize(axis), angle)
    }

    /// Fixed body at the origin and a unit sphere, both unrotated.
    fn fixed_and_free() -> (Body, Body) {
        (Body::cuboid(0.5, 0.5, 0.5, true).unwrap(), Body::sphere(0.5, false).unwrap())
    }

    #[test]
    fn angle_limits_are_validated() {
        assert!(AngleLimit::new(Axis::PositiveX, Axis::PositiveX, -0.5, 0.5).is_ok());
        assert_eq!(
            AngleLimit::new(Axis::PositiveX, Axis::PositiveX, 0.5, -0.5),
            Err(PhysicsError::InvalidJointLimits {
                lower: 0.5,
                upper: -0.5
            })
        );
        assert!(AngleLimit::new(Axis::PositiveX, Axis::PositiveX, -4.0, 0.0).is_err());
    }

    #[test]
    fn signed_angle_covers_obtuse_and_negative_angles() {
        let n = Vec3::z();
        let x = Vec3::x();
        for angle in [0.3, -0.3, 2.5, -2.5, 1.0] {
            let n2 = about(n, angle) * x;
            assert_relative_eq!(signed_angle(&n, &x, &n2), angle, epsilon = 1e-9);
        }
    }

    #[test]
    fn limit_angle_is_silent_inside_the_window() {
        let n2 = about(Vec3::z(), 0.2) * Vec3::x();
        assert_eq!(limit_angle(&Vec3::z(), &Vec3::x(), &n2, -0.5, 0.5), None);
    }

    #[test]
    fn limit_angle_points_back_to_the_nearest_bound() {
        let n2 = about(Vec3::z(), 1.0) * Vec3::x();

        let error = limit_angle(&Vec3::z(), &Vec3::x(), &n2, -0.5, 0.5).unwrap();

        // Body 2 overshoots the upper bound by 0.5 rad.
        assert_relative_eq!(error, Vec3::new(0.0, 0.0, -(0.5f64).sin()), epsilon = 1e-9);
    }

    #[test]
    fn hinge_aligns_axes_and_joins_anchors() {
        let (mut b1, mut b2) = fixed_and_free();
        b2.set_position(Vec3::new(1.2, 0.0, 0.0));
        b2.set_rotation(about(Vec3::x(), 0.3));
        let mut hinge = HingeJoint::new(
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(-0.5, 0.0, 0.0),
            Axis::PositiveZ,
            Axis::PositiveZ,
            0.0,
        );

        for _ in 0..30 {
            hinge.solve(&mut b1, &mut b2, 1.0 / 60.0);
        }

        let a2 = Axis::PositiveZ.in_world(&b2.rotation());
        assert!(a2.dot(&Vec3::z()) > 1.0 - 1e-6, "hinge axis {a2:?}");
        let p2 = b2.local_to_world(&Vec3::new(-0.5, 0.0, 0.0));
        assert_relative_eq!(p2, Vec3::new(0.5, 0.0, 0.0), epsilon = 1e-6);
        assert_eq!(b1.position(), Vec3::zeros());
    }

    #[test]
    fn hinge_limit_stops_rotation_at_the_bound() {
        let (mut b1, mut b2) = fixed_and_free();
        b2.set_rotation(about(Vec3::z(), 1.0));
        let limit = AngleLimit::new(Axis::PositiveX, Axis::PositiveX, -0.3, 0.3).unwrap();
        let mut hinge = HingeJoint::new(
            Vec3::zeros(),
            Vec3::zeros(),
            Axis::PositiveZ,
            Axis::PositiveZ,
            0.0,
        )
        .with_limit(limit);

        for _ in 0..20 {
            hinge.solve(&mut b1, &mut b2, 1.0 / 60.0);
        }

        let x2 = Axis::PositiveX.in_world(&b2.rotation());
        assert_relative_eq!(signed_angle(&Vec3::z(), &Vec3::x(), &x2), 0.3, epsilon = 1e-4);
    }

    #[test]
    fn spherical_joint_limits_swing() {
        let (mut b1, mut b2) = fixed_and_free();
        b2.set_rotation(about(Vec3::x(), 1.0));
        let mut joint = SphericalJoint::new(
            Vec3::zeros(),
            Vec3::zeros(),
            AngleLimit::new(Axis::PositiveY, Axis::PositiveY, 0.0, 0.5).unwrap(),
            AngleLimit::new(Axis::PositiveX, Axis::PositiveX, -0.2, 0.2).unwrap(),
        );

        for _ in 0..20 {
            joint.solve(&mut b1, &mut b2);
        }

        let y2 = Axis::PositiveY.in_world(&b2.rotation());
        assert_relative_eq!(y2.dot(&Vec3::y()).acos(), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn spherical_joint_limits_twist() {
        let (mut b1, mut b2) = fixed_and_free();
        b2.set_rotation(about(Vec3::y(), 1.0));
        let mut joint = SphericalJoint::new(
            Vec3::zeros(),
            Vec3::zeros(),
            AngleLimit::new(Axis::PositiveY, Axis::PositiveY, 0.0, 0.5).unwrap(),
            AngleLimit::new(Axis::PositiveX, Axis::PositiveX, -0.2, 0.2).unwrap(),
        );

        for _ in 0..20 {
            joint.solve(&mut b1, &mut b2);
        }

        let x2 = Axis::PositiveX.in_world(&b2.rotation());
        assert_relative_eq!(signed_angle(&Vec3::y(), &Vec3::x(), &x2), 0.2, epsilon = 1e-4);
    }

    #[test]
    fn reset_clears_every_multiplier() {
        let (mut b1, mut b2) = fixed_and_free();
        b2.set_position(Vec3::new(0.3, 0.0, 0.0));
        let mut joint = SphericalJoint::new(
            Vec3::zeros(),
            Vec3::zeros(),
            AngleLimit::free(Axis::PositiveY, Axis::PositiveY),
            AngleLimit::free(Axis::PositiveX, Axis::PositiveX),
        );
        joint.solve(&mut b1, &mut b2);
        assert_ne!(joint.lambda_position, 0.0);

        joint.reset_lambdas();

        assert_eq!(joint.lambda_position, 0.0);
        assert_eq!(joint.lambda_swing, 0.0);
        assert_eq!(joint.lambda_twist, 0.0);
    }
}
