use log::{error, warn};

use crate::collider::{Collider, inertia_tensor};
use crate::error::PhysicsError;
use crate::types::{Mat3, Quat, Real, Vec3};

/// Mass given to bodies built by the shape constructors (kilograms).
pub const DEFAULT_MASS: Real = 1.0;

/// A force applied at a point until the end of the next `simulate` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Force {
    /// Application point relative to the center of mass.
    pub position: Vec3,
    /// Force vector in newtons.
    pub force: Vec3,
    /// When true, `position` and `force` are in the body frame and follow its rotation.
    pub local: bool,
}

/// Surface properties used by contact constraints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub static_friction: Real,
    pub dynamic_friction: Real,
    pub restitution: Real,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            static_friction: 0.5,
            dynamic_friction: 0.5,
            restitution: 0.0,
        }
    }
}

impl Material {
    /// Validate and build a material.
    ///
    /// Coefficients must lie in `[0, 1]`. Dynamic friction above static
    /// friction is accepted but logged.
    pub fn new(
        static_friction: Real,
        dynamic_friction: Real,
        restitution: Real,
    ) -> Result<Self, PhysicsError> {
        let unit = |x: Real| (0.0..=1.0).contains(&x);
        if !unit(static_friction) || !unit(dynamic_friction) {
            let err = PhysicsError::InvalidFriction {
                static_friction,
                dynamic_friction,
            };
            error!("{err}");
            return Err(err);
        }
        if !unit(restitution) {
            let err = PhysicsError::InvalidRestitution(restitution);
            error!("{err}");
            return Err(err);
        }
        if dynamic_friction > static_friction {
            warn!(
                "{}",
                PhysicsError::FrictionOrdering {
                    static_friction,
                    dynamic_friction,
                }
            );
        }
        Ok(Self {
            static_friction,
            dynamic_friction,
            restitution,
        })
    }
}

/// Pose and velocity at the start of the current substep.
///
/// Written once per substep before prediction, read once when velocities
/// are rebuilt from the pose delta.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PreviousState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

/// A rigid body made of one or more convex colliders.
///
/// Fixed bodies have zero inverse mass and inverse inertia and are never
/// moved by the solver. Inactive (sleeping) bodies keep their pose until
/// `activate` is called, which every velocity or force mutator does.
#[derive(Clone, Debug)]
pub struct Body {
    pub(crate) position: Vec3,
    pub(crate) rotation: Quat,
    scale: Vec3,
    pub(crate) linear_velocity: Vec3,
    pub(crate) angular_velocity: Vec3,
    mass: Real,
    pub(crate) inverse_mass: Real,
    inertia: Mat3,
    pub(crate) inverse_inertia: Mat3,
    forces: Vec<Force>,
    material: Material,
    fixed: bool,
    pub(crate) active: bool,
    pub(crate) deactivation_time: Real,
    pub(crate) previous: PreviousState,
    pub(crate) colliders: Vec<Collider>,
    bounding_radius: Real,
}

impl Body {
    /// Body from an arbitrary set of colliders.
    pub fn new(colliders: Vec<Collider>, mass: Real, is_static: bool) -> Result<Self, PhysicsError> {
        if colliders.is_empty() {
            error!("{}", PhysicsError::EmptyColliders);
            return Err(PhysicsError::EmptyColliders);
        }
        validate_mass(mass)?;
        Ok(Self::from_colliders(colliders, mass, is_static))
    }

    /// Solid sphere of mass 1 centered on the body origin.
    pub fn sphere(radius: Real, is_static: bool) -> Result<Self, PhysicsError> {
        let collider = Collider::sphere(radius).inspect_err(|e| error!("{e}"))?;
        Ok(Self::from_colliders(vec![collider], DEFAULT_MASS, is_static))
    }

    /// Axis-aligned box of mass 1 with the given half extents.
    pub fn cuboid(hx: Real, hy: Real, hz: Real, is_static: bool) -> Result<Self, PhysicsError> {
        let collider = Collider::cuboid(hx, hy, hz).inspect_err(|e| error!("{e}"))?;
        Ok(Self::from_colliders(vec![collider], DEFAULT_MASS, is_static))
    }

    /// Convex hull of mass 1 from vertex and triangle index buffers.
    pub fn convex_hull(
        vertices: &[Vec3],
        indices: &[usize],
        is_static: bool,
    ) -> Result<Self, PhysicsError> {
        let collider = Collider::convex_hull(vertices, indices).inspect_err(|e| error!("{e}"))?;
        Ok(Self::from_colliders(vec![collider], DEFAULT_MASS, is_static))
    }

    fn from_colliders(colliders: Vec<Collider>, mass: Real, fixed: bool) -> Self {
        let bounding_radius = colliders
            .iter()
            .map(Collider::bounding_radius)
            .fold(0.0, Real::max);
        let mut body = Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            mass,
            inverse_mass: 0.0,
            inertia: Mat3::zeros(),
            inverse_inertia: Mat3::zeros(),
            forces: Vec::new(),
            material: Material::default(),
            fixed,
            active: true,
            deactivation_time: 0.0,
            previous: PreviousState {
                position: Vec3::zeros(),
                rotation: Quat::identity(),
                linear_velocity: Vec3::zeros(),
                angular_velocity: Vec3::zeros(),
            },
            colliders,
            bounding_radius,
        };
        body.refresh_mass_properties();
        body.update_colliders();
        body
    }

    /// Builder form of `set_material`.
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// Builder form of `set_mass`.
    pub fn with_mass(mut self, mass: Real) -> Result<Self, PhysicsError> {
        self.set_mass(mass)?;
        Ok(self)
    }

    /// Builder form of `set_position`.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    /// Builder form of `set_rotation`.
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.set_rotation(rotation);
        self
    }

    fn refresh_mass_properties(&mut self) {
        self.inertia = inertia_tensor(&self.colliders, self.mass);
        if self.fixed {
            self.inverse_mass = 0.0;
            self.inverse_inertia = Mat3::zeros();
        } else {
            self.inverse_mass = 1.0 / self.mass;
            self.inverse_inertia = self.inertia.try_inverse().unwrap_or_else(Mat3::zeros);
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_colliders();
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.update_colliders();
    }

    /// Visual scale. Colliders are not rescaled; build them at final size.
    #[inline]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    #[inline]
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    #[inline]
    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    #[inline]
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    /// Add to the linear velocity.
    pub fn push(&mut self, delta: Vec3) {
        self.linear_velocity += delta;
        self.activate();
    }

    /// Add to the angular velocity.
    pub fn turn(&mut self, delta: Vec3) {
        self.angular_velocity += delta;
        self.activate();
    }

    /// Zero the linear velocity.
    pub fn stop(&mut self) {
        self.linear_velocity = Vec3::zeros();
        self.activate();
    }

    /// Zero the angular velocity.
    pub fn rest(&mut self) {
        self.angular_velocity = Vec3::zeros();
        self.activate();
    }

    /// Queue a force for the next `simulate` call.
    ///
    /// `position` is relative to the center of mass. With `local` set both
    /// vectors are read in the body frame at integration time.
    pub fn add_force(&mut self, position: Vec3, force: Vec3, local: bool) {
        self.forces.push(Force {
            position,
            force,
            local,
        });
        self.activate();
    }

    #[inline]
    pub fn forces(&self) -> &[Force] {
        &self.forces
    }

    /// Mass in kilograms. Fixed bodies report the mass they were built with.
    #[inline]
    pub fn mass(&self) -> Real {
        self.mass
    }

    #[inline]
    pub fn inverse_mass(&self) -> Real {
        self.inverse_mass
    }

    /// Local-space inertia tensor.
    #[inline]
    pub fn inertia(&self) -> Mat3 {
        self.inertia
    }

    #[inline]
    pub fn inverse_inertia(&self) -> Mat3 {
        self.inverse_inertia
    }

    pub fn set_mass(&mut self, mass: Real) -> Result<(), PhysicsError> {
        validate_mass(mass)?;
        self.mass = mass;
        self.refresh_mass_properties();
        Ok(())
    }

    #[inline]
    pub fn material(&self) -> Material {
        self.material
    }

    /// Validate and replace friction and restitution.
    pub fn set_material(
        &mut self,
        static_friction: Real,
        dynamic_friction: Real,
        restitution: Real,
    ) -> Result<(), PhysicsError> {
        self.material = Material::new(static_friction, dynamic_friction, restitution)?;
        Ok(())
    }

    /// Wake the body and restart its sleep timer.
    #[inline]
    pub fn activate(&mut self) {
        self.active = true;
        self.deactivation_time = 0.0;
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    #[inline]
    pub fn deactivation_time(&self) -> Real {
        self.deactivation_time
    }

    #[inline]
    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    /// Radius of a sphere around `position` enclosing every collider.
    #[inline]
    pub fn bounding_radius(&self) -> Real {
        self.bounding_radius
    }

    /// True when the solver integrates and corrects this body.
    #[inline]
    pub(crate) fn is_dynamic(&self) -> bool {
        !self.fixed && self.active
    }

    /// Local inertia rotated into world space: `R I Rᵀ`.
    pub(crate) fn world_inertia(&self) -> Mat3 {
        let r = self.rotation.to_rotation_matrix().into_inner();
        r * self.inertia * r.transpose()
    }

    /// Local inverse inertia rotated into world space.
    pub(crate) fn world_inverse_inertia(&self) -> Mat3 {
        let r = self.rotation.to_rotation_matrix().into_inner();
        r * self.inverse_inertia * r.transpose()
    }

    /// Point given in the body frame, expressed in world space.
    #[inline]
    pub fn local_to_world(&self, local: &Vec3) -> Vec3 {
        self.rotation * local + self.position
    }

    pub(crate) fn update_colliders(&mut self) {
        for collider in &mut self.colliders {
            collider.update(&self.position, &self.rotation);
        }
    }

    /// Queue gravity without waking the body.
    pub(crate) fn apply_gravity(&mut self, gravity: &Vec3) {
        if self.fixed {
            return;
        }
        self.forces.push(Force {
            position: Vec3::zeros(),
            force: gravity * self.mass,
            local: false,
        });
    }

    pub(crate) fn clear_forces(&mut self) {
        self.forces.clear();
    }

    /// World-space net force and torque about the center of mass.
    pub(crate) fn net_force_and_torque(&self) -> (Vec3, Vec3) {
        self.forces
            .iter()
            .fold((Vec3::zeros(), Vec3::zeros()), |(force, torque), f| {
                let (arm, push) = if f.local {
                    (self.rotation * f.position, self.rotation * f.force)
                } else {
                    (f.position, f.force)
                };
                (force + push, torque + arm.cross(&push))
            })
    }

    pub(crate) fn snapshot(&mut self) {
        self.previous = PreviousState {
            position: self.position,
            rotation: self.rotation,
            linear_velocity: self.linear_velocity,
            angular_velocity: self.angular_velocity,
        };
    }
}

fn validate_mass(mass: Real) -> Result<(), PhysicsError> {
    if mass.is_finite() && mass > 0.0 {
        Ok(())
    } else {
        let err = PhysicsError::InvalidMass(mass);
        error!("{err}");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn shape_constructors_use_reference_defaults() {
        let body = Body::sphere(0.5, false).unwrap();

        assert_eq!(body.mass(), 1.0);
        assert_eq!(body.inverse_mass(), 1.0);
        assert_eq!(body.material(), Material::default());
        assert!(body.is_active());
        assert!(!body.is_fixed());
        assert_eq!(body.rotation(), Quat::identity());
    }

    #[test]
    fn static_body_has_zero_inverse_mass_and_inertia() {
        let body = Body::cuboid(5.0, 1.0, 5.0, true).unwrap();

        assert!(body.is_fixed());
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(body.inverse_inertia(), Mat3::zeros());
        assert_eq!(body.world_inverse_inertia(), Mat3::zeros());
    }

    #[test]
    fn dynamic_sphere_inverse_inertia_inverts_tensor() {
        let body = Body::sphere(1.0, false).unwrap().with_mass(2.5).unwrap();

        assert_relative_eq!(body.inertia(), Mat3::identity(), epsilon = 1e-12);
        assert_relative_eq!(body.inverse_inertia(), Mat3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn invalid_material_is_rejected_and_body_unchanged() {
        let mut body = Body::sphere(1.0, false).unwrap();

        assert!(matches!(
            body.set_material(1.5, 0.2, 0.0),
            Err(PhysicsError::InvalidFriction { .. })
        ));
        assert_eq!(
            body.set_material(0.5, 0.5, -0.1),
            Err(PhysicsError::InvalidRestitution(-0.1))
        );
        assert_eq!(body.material(), Material::default());

        // Dynamic above static only warns.
        assert!(body.set_material(0.2, 0.4, 0.0).is_ok());
    }

    #[test]
    fn invalid_mass_and_empty_colliders_are_rejected() {
        assert_eq!(
            Body::new(vec![Collider::sphere(1.0).unwrap()], 0.0, false).err(),
            Some(PhysicsError::InvalidMass(0.0))
        );
        assert_eq!(
            Body::new(Vec::new(), 1.0, false).err(),
            Some(PhysicsError::EmptyColliders)
        );
    }

    #[test]
    fn zero_sized_shapes_are_rejected() {
        assert_eq!(
            Body::cuboid(0.0, 0.0, 0.0, false).err(),
            Some(PhysicsError::InvalidDimension(0.0))
        );
        assert_eq!(
            Body::sphere(0.0, true).err(),
            Some(PhysicsError::InvalidDimension(0.0))
        );
    }

    #[test]
    fn convex_hull_rejects_partial_triangles() {
        let vertices = [Vec3::zeros(), Vec3::x(), Vec3::y(), Vec3::z()];
        let result = Body::convex_hull(&vertices, &[0, 2, 1, 0, 1], false);

        assert!(matches!(result, Err(PhysicsError::InvalidHullBuffers(_))));
    }

    #[test]
    fn velocity_and_force_mutators_wake_the_body() {
        let mut body = Body::sphere(1.0, false).unwrap();

        body.active = false;
        body.deactivation_time = 3.0;
        body.push(Vec3::new(1.0, 0.0, 0.0));
        assert!(body.is_active());
        assert_eq!(body.deactivation_time(), 0.0);

        body.active = false;
        body.add_force(Vec3::zeros(), Vec3::y(), false);
        assert!(body.is_active());
    }

    #[test]
    fn gravity_does_not_wake_the_body() {
        let mut body = Body::sphere(1.0, false).unwrap().with_mass(2.0).unwrap();
        body.active = false;

        body.apply_gravity(&Vec3::new(0.0, -10.0, 0.0));

        assert!(!body.is_active());
        let (force, torque) = body.net_force_and_torque();
        assert_eq!(force, Vec3::new(0.0, -20.0, 0.0));
        assert_eq!(torque, Vec3::zeros());
    }

    #[test]
    fn local_forces_follow_body_rotation() {
        let rot = Quat::from_axis_angle(&Vec3::z_axis(), std::f64::consts::FRAC_PI_2);
        let mut body = Body::sphere(1.0, false).unwrap().with_rotation(rot);

        // Push along local +Y at local +X: world push along -X at world +Y.
        body.add_force(Vec3::x(), Vec3::y(), true);
        let (force, torque) = body.net_force_and_torque();

        assert_relative_eq!(force, -Vec3::x(), epsilon = 1e-12);
        assert_relative_eq!(torque, Vec3::y().cross(&-Vec3::x()), epsilon = 1e-12);
    }

    #[test]
    fn set_position_refreshes_collider_cache() {
        let body = Body::sphere(1.0, false).unwrap().with_position(Vec3::new(1.0, 2.0, 3.0));

        let Collider::Sphere(s) = &body.colliders()[0] else {
            panic!("expected a sphere");
        };
        assert_eq!(s.center(), Vec3::new(1.0, 2.0, 3.0));
    }
}
