use log::error;

use crate::body::Body;
use crate::error::PhysicsError;
use crate::solver::base::{
    Arms, apply_angular, apply_positional, angular_delta_lambda, compliance_term,
    generalized_inverse_mass, pair_mut, positional_delta_lambda,
};
use crate::solver::joint::{HingeJoint, SphericalJoint};
use crate::types::{BodyId, Real, Vec3, rotation_vector};

/// Relative tangential speeds below this get no dynamic friction (m/s).
const MIN_TANGENT_SPEED: Real = 1.0e-9;

/// Keeps a body-local attachment point at a fixed world offset from another.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionalConstraint {
    /// Attachment point on body 1, body frame.
    pub anchor1: Vec3,
    /// Attachment point on body 2, body frame.
    pub anchor2: Vec3,
    /// Target world-space offset `p1 - p2`.
    pub distance: Vec3,
    /// Inverse stiffness (m/N). Zero is rigid.
    pub compliance: Real,
    lambda: Real,
}

/// Keeps two bodies at the same orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MutualOrientationConstraint {
    pub compliance: Real,
    lambda: Real,
}

/// Non-penetration plus friction at one contact point.
///
/// Built from a narrow-phase contact each substep. The attachment points
/// are stored in each body's frame so they follow the bodies while the
/// position passes run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionConstraint {
    pub anchor1: Vec3,
    pub anchor2: Vec3,
    /// World-space unit normal from body 2 toward body 1.
    pub normal: Vec3,
    lambda_n: Real,
    lambda_t: Real,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintKind {
    Positional(PositionalConstraint),
    Collision(CollisionConstraint),
    MutualOrientation(MutualOrientationConstraint),
    Hinge(HingeJoint),
    Spherical(SphericalJoint),
}

/// A constraint between two bodies of the slice handed to the solver.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    b1: BodyId,
    b2: BodyId,
    kind: ConstraintKind,
}

impl Constraint {
    fn validated(b1: BodyId, b2: BodyId, kind: ConstraintKind) -> Result<Self, PhysicsError> {
        if b1 == b2 {
            let err = PhysicsError::SameBody(b1);
            error!("{err}");
            return Err(err);
        }
        Ok(Self { b1, b2, kind })
    }

    /// Rigid or soft link between two attachment points.
    pub fn positional(
        b1: BodyId,
        b2: BodyId,
        anchor1: Vec3,
        anchor2: Vec3,
        distance: Vec3,
        compliance: Real,
    ) -> Result<Self, PhysicsError> {
        let compliance = validate_compliance(compliance)?;
        Self::validated(
            b1,
            b2,
            ConstraintKind::Positional(PositionalConstraint {
                anchor1,
                anchor2,
                distance,
                compliance,
                lambda: 0.0,
            }),
        )
    }

    /// Lock the relative orientation of two bodies.
    pub fn mutual_orientation(
        b1: BodyId,
        b2: BodyId,
        compliance: Real,
    ) -> Result<Self, PhysicsError> {
        let compliance = validate_compliance(compliance)?;
        Self::validated(
            b1,
            b2,
            ConstraintKind::MutualOrientation(MutualOrientationConstraint {
                compliance,
                lambda: 0.0,
            }),
        )
    }

    pub fn hinge(b1: BodyId, b2: BodyId, joint: HingeJoint) -> Result<Self, PhysicsError> {
        validate_compliance(joint.compliance)?;
        Self::validated(b1, b2, ConstraintKind::Hinge(joint))
    }

    pub fn spherical(b1: BodyId, b2: BodyId, joint: SphericalJoint) -> Result<Self, PhysicsError> {
        Self::validated(b1, b2, ConstraintKind::Spherical(joint))
    }

    /// Contact constraint from world-space contact points.
    pub(crate) fn collision(
        b1: BodyId,
        body1: &Body,
        b2: BodyId,
        body2: &Body,
        contact: &crate::collision::Contact,
    ) -> Self {
        let to_local = |body: &Body, p: &Vec3| body.rotation.inverse_transform_vector(&(p - body.position));
        Self {
            b1,
            b2,
            kind: ConstraintKind::Collision(CollisionConstraint {
                anchor1: to_local(body1, &contact.point1),
                anchor2: to_local(body2, &contact.point2),
                normal: contact.normal,
                lambda_n: 0.0,
                lambda_t: 0.0,
            }),
        }
    }

    #[inline]
    pub fn bodies(&self) -> (BodyId, BodyId) {
        (self.b1, self.b2)
    }

    #[inline]
    pub fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// Zero every Lagrange multiplier.
    pub fn reset_lambdas(&mut self) {
        match &mut self.kind {
            ConstraintKind::Positional(c) => c.lambda = 0.0,
            ConstraintKind::Collision(c) => {
                c.lambda_n = 0.0;
                c.lambda_t = 0.0;
            }
            ConstraintKind::MutualOrientation(c) => c.lambda = 0.0,
            ConstraintKind::Hinge(j) => j.reset_lambdas(),
            ConstraintKind::Spherical(j) => j.reset_lambdas(),
        }
    }

    /// One position pass over this constraint with substep `h`.
    pub fn solve(&mut self, bodies: &mut [Body], h: Real) {
        let Some((b1, b2)) = pair_mut(bodies, self.b1, self.b2) else {
            error!("solver: constraint between {} and {} skipped, invalid pair", self.b1, self.b2);
            return;
        };
        if !b1.is_dynamic() && !b2.is_dynamic() {
            return;
        }
        match &mut self.kind {
            ConstraintKind::Positional(c) => c.solve(b1, b2, h),
            ConstraintKind::Collision(c) => c.solve(b1, b2),
            ConstraintKind::MutualOrientation(c) => c.solve(b1, b2, h),
            ConstraintKind::Hinge(j) => j.solve(b1, b2, h),
            ConstraintKind::Spherical(j) => j.solve(b1, b2),
        }
    }

    /// Velocity pass. Only contacts act at velocity level.
    pub(crate) fn solve_velocity(&self, bodies: &mut [Body], h: Real, restitution_threshold: Real) {
        let ConstraintKind::Collision(c) = &self.kind else {
            return;
        };
        if let Some((b1, b2)) = pair_mut(bodies, self.b1, self.b2) {
            c.solve_velocity(b1, b2, h, restitution_threshold);
        }
    }
}

fn validate_compliance(compliance: Real) -> Result<Real, PhysicsError> {
    if compliance.is_finite() && compliance >= 0.0 {
        Ok(compliance)
    } else {
        let err = PhysicsError::InvalidCompliance(compliance);
        error!("{err}");
        Err(err)
    }
}

/// Rigid positional link at two anchors, shared by every joint.
pub(crate) fn solve_anchor_link(
    b1: &mut Body,
    b2: &mut Body,
    anchor1: &Vec3,
    anchor2: &Vec3,
    target: &Vec3,
    alpha: Real,
    lambda: &mut Real,
) {
    let arms = Arms::from_local(b1, b2, anchor1, anchor2);
    let (p1, p2) = arms.points(b1, b2);
    let delta_x = p1 - p2 - target;
    let dl = positional_delta_lambda(b1, b2, &arms, &delta_x, alpha, *lambda);
    apply_positional(b1, b2, &arms, &delta_x, dl);
    *lambda += dl;
}

impl PositionalConstraint {
    fn solve(&mut self, b1: &mut Body, b2: &mut Body, h: Real) {
        solve_anchor_link(
            b1,
            b2,
            &self.anchor1,
            &self.anchor2,
            &self.distance,
            compliance_term(self.compliance, h),
            &mut self.lambda,
        );
    }
}

impl MutualOrientationConstraint {
    fn solve(&mut self, b1: &mut Body, b2: &mut Body, h: Real) {
        let error = rotation_vector(&(b1.rotation * b2.rotation.inverse()));
        let alpha = compliance_term(self.compliance, h);
        let dl = angular_delta_lambda(b1, b2, &error, alpha, self.lambda);
        apply_angular(b1, b2, &error, dl);
        self.lambda += dl;
    }
}

impl CollisionConstraint {
    /// Normal multiplier accumulated over the position passes.
    #[inline]
    pub fn lambda_n(&self) -> Real {
        self.lambda_n
    }

    fn solve(&mut self, b1: &mut Body, b2: &mut Body) {
        let arms = Arms::from_local(b1, b2, &self.anchor1, &self.anchor2);
        let (p1, p2) = arms.points(b1, b2);
        let depth = (p2 - p1).dot(&self.normal);
        if depth <= 0.0 {
            return;
        }

        let delta_x = -self.normal * depth;
        let dl = positional_delta_lambda(b1, b2, &arms, &delta_x, 0.0, self.lambda_n);
        apply_positional(b1, b2, &arms, &delta_x, dl);
        self.lambda_n += dl;

        // Static friction: cancel tangential drift of the contact points
        // while the tangential multiplier stays inside the friction cone.
        let arms = Arms::from_local(b1, b2, &self.anchor1, &self.anchor2);
        let (p1, p2) = arms.points(b1, b2);
        let p1_prev = b1.previous.position + b1.previous.rotation * self.anchor1;
        let p2_prev = b2.previous.position + b2.previous.rotation * self.anchor2;
        let drift = (p1 - p1_prev) - (p2 - p2_prev);
        let drift_t = drift - self.normal * drift.dot(&self.normal);

        let dl_t = positional_delta_lambda(b1, b2, &arms, &drift_t, 0.0, self.lambda_t);
        let mu_s = 0.5 * (b1.material().static_friction + b2.material().static_friction);
        if (self.lambda_t + dl_t).abs() < mu_s * self.lambda_n.abs() {
            apply_positional(b1, b2, &arms, &drift_t, dl_t);
            self.lambda_t += dl_t;
        }
    }

    fn solve_velocity(&self, b1: &mut Body, b2: &mut Body, h: Real, restitution_threshold: Real) {
        if self.lambda_n == 0.0 {
            return;
        }
        let n = self.normal;
        let arms = Arms::from_local(b1, b2, &self.anchor1, &self.anchor2);
        let point_velocity = |v: &Vec3, w: &Vec3, r: &Vec3| v + w.cross(r);

        let v = point_velocity(&b1.linear_velocity, &b1.angular_velocity, &arms.r1)
            - point_velocity(&b2.linear_velocity, &b2.angular_velocity, &arms.r2);
        let vn = n.dot(&v);
        let vt = v - n * vn;

        let mut dv = Vec3::zeros();

        let vt_len = vt.norm();
        if vt_len > MIN_TANGENT_SPEED {
            let mu_d = 0.5 * (b1.material().dynamic_friction + b2.material().dynamic_friction);
            let normal_force = self.lambda_n / h;
            dv -= vt / vt_len * (mu_d * normal_force.abs()).min(vt_len);
        }

        let prev = &b1.previous;
        let v_prev = point_velocity(&prev.linear_velocity, &prev.angular_velocity, &arms.r1)
            - point_velocity(
                &b2.previous.linear_velocity,
                &b2.previous.angular_velocity,
                &arms.r2,
            );
        let vn_prev = n.dot(&v_prev);
        let e = if vn_prev.abs() <= restitution_threshold {
            0.0
        } else {
            b1.material().restitution * b2.material().restitution
        };
        dv += n * (-vn + (-e * vn_prev).max(0.0));

        let w1 = generalized_inverse_mass(b1, &b1.world_inverse_inertia(), &arms.r1, &n);
        let w2 = generalized_inverse_mass(b2, &b2.world_inverse_inertia(), &arms.r2, &n);
        if w1 + w2 <= crate::settings::CONSTRAINT_EPSILON {
            error!("solver: contact between two immovable bodies skipped");
            return;
        }
        let impulse = dv / (w1 + w2);

        if !b1.is_fixed() {
            b1.linear_velocity += impulse * b1.inverse_mass;
            b1.angular_velocity += b1.world_inverse_inertia() * arms.r1.cross(&impulse);
        }
        if !b2.is_fixed() {
            b2.linear_velocity -= impulse * b2.inverse_mass;
            b2.angular_velocity -= b2.world_inverse_inertia() * arms.r2.cross(&impulse);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::Contact;
    use approx::assert_relative_eq;

    fn pair() -> Vec<Body> {
        vec![
            Body::sphere(0.5, false).unwrap(),
            Body::sphere(0.5, false).unwrap().with_position(Vec3::new(3.0, 0.0, 0.0)),
        ]
    }

    #[test]
    fn constraints_between_one_body_are_rejected() {
        let err = Constraint::positional(BodyId(1), BodyId(1), Vec3::zeros(), Vec3::zeros(), Vec3::zeros(), 0.0);
        assert_eq!(err, Err(PhysicsError::SameBody(BodyId(1))));
    }

    #[test]
    fn negative_compliance_is_rejected() {
        assert_eq!(
            Constraint::mutual_orientation(BodyId(0), BodyId(1), -1.0),
            Err(PhysicsError::InvalidCompliance(-1.0))
        );
    }

    #[test]
    fn rigid_positional_constraint_closes_gap_in_one_pass() {
        let mut bodies = pair();
        let mut c = Constraint::positional(
            BodyId(0),
            BodyId(1),
            Vec3::zeros(),
            Vec3::zeros(),
            Vec3::new(-2.0, 0.0, 0.0),
            0.0,
        )
        .unwrap();

        c.solve(&mut bodies, 1.0 / 60.0);

        let gap = bodies[0].position() - bodies[1].position();
        assert_relative_eq!(gap, Vec3::new(-2.0, 0.0, 0.0), epsilon = 1e-12);
        // Equal masses meet halfway.
        assert_relative_eq!(bodies[0].position().x, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn mutual_orientation_pulls_rotations_together() {
        let mut bodies = pair();
        bodies[0].set_rotation(crate::types::Quat::from_scaled_axis(Vec3::new(0.0, 0.2, 0.0)));
        let mut c = Constraint::mutual_orientation(BodyId(0), BodyId(1), 0.0).unwrap();

        for _ in 0..10 {
            c.solve(&mut bodies, 1.0 / 60.0);
        }

        let relative = bodies[0].rotation().angle_to(&bodies[1].rotation());
        assert!(relative < 1e-3, "relative angle {relative}");
    }

    #[test]
    fn sleeping_pair_is_left_alone() {
        let mut bodies = pair();
        bodies[0].active = false;
        bodies[1].active = false;
        let mut c = Constraint::positional(
            BodyId(0),
            BodyId(1),
            Vec3::zeros(),
            Vec3::zeros(),
            Vec3::zeros(),
            0.0,
        )
        .unwrap();

        c.solve(&mut bodies, 1.0 / 60.0);

        assert_eq!(bodies[1].position(), Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn collision_constraint_pushes_bodies_apart_along_normal() {
        let mut bodies = vec![
            Body::cuboid(5.0, 1.0, 5.0, true).unwrap().with_position(Vec3::new(0.0, -1.0, 0.0)),
            Body::sphere(0.5, false).unwrap().with_position(Vec3::new(0.0, 0.45, 0.0)),
        ];
        for b in &mut bodies {
            b.snapshot();
        }
        // Ball point dips 0.05 below the floor top; normal from ball down to floor.
        let contact = Contact::new(Vec3::zeros(), Vec3::new(0.0, -0.05, 0.0), -Vec3::y());
        let mut c = Constraint::collision(BodyId(0), &bodies[0], BodyId(1), &bodies[1], &contact);

        c.solve(&mut bodies, 1.0 / 60.0);

        assert_eq!(bodies[0].position(), Vec3::new(0.0, -1.0, 0.0));
        assert_relative_eq!(bodies[1].position().y, 0.5, epsilon = 1e-12);
        let ConstraintKind::Collision(cc) = c.kind() else {
            panic!("expected a collision constraint");
        };
        assert!(cc.lambda_n() < 0.0);
    }

    #[test]
    fn contact_velocity_pass_removes_approach_speed() {
        let mut bodies = vec![
            Body::cuboid(5.0, 1.0, 5.0, true).unwrap().with_position(Vec3::new(0.0, -1.0, 0.0)),
            Body::sphere(0.5, false).unwrap().with_position(Vec3::new(0.0, 0.45, 0.0)),
        ];
        for b in &mut bodies {
            b.snapshot();
        }
        let contact = Contact::new(Vec3::zeros(), Vec3::new(0.0, -0.05, 0.0), -Vec3::y());
        let mut c = Constraint::collision(BodyId(0), &bodies[0], BodyId(1), &bodies[1], &contact);
        c.solve(&mut bodies, 1.0 / 60.0);

        bodies[1].linear_velocity = Vec3::new(0.0, -2.0, 0.0);
        c.solve_velocity(&mut bodies, 1.0 / 60.0, 0.4);

        // Zero restitution: the ball stops moving into the floor.
        assert_relative_eq!(bodies[1].linear_velocity().y, 0.0, epsilon = 1e-12);
    }
}
