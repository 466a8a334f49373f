//! Owning container for bodies and persistent constraints.
//!
//! `PhysicsWorld` is a thin arena over `simulate_with_constraints`:
//! - bodies live in a dense `Vec` and are addressed by `BodyId`
//! - constraints are validated against the arena when they are added
//! - `step` advances everything by one fixed timestep
//!
//! Bodies are never removed, so an id stays valid for the life of the world.

use log::{debug, error};

use crate::body::Body;
use crate::error::PhysicsError;
use crate::query::{RayHit, cast_ray};
use crate::settings::SimulationSettings;
use crate::solver::{Constraint, simulate_with_constraints};
use crate::types::{BodyId, Real, Vec3};

#[derive(Clone, Debug, Default)]
pub struct PhysicsWorld {
    bodies: Vec<Body>,
    constraints: Vec<Constraint>,
    settings: SimulationSettings,
}

impl PhysicsWorld {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            bodies: Vec::new(),
            constraints: Vec::new(),
            settings,
        }
    }

    /// Insert a body and return its handle.
    pub fn add_body(&mut self, body: Body) -> BodyId {
        let id = BodyId(self.bodies.len());
        self.bodies.push(body);
        debug!("world: added {id}");
        id
    }

    #[inline]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id.index())
    }

    #[inline]
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(id.index())
    }

    #[inline]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Store a joint or link. Both ids must refer to bodies of this world.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), PhysicsError> {
        let (a, b) = constraint.bodies();
        if let Some(missing) = [a, b].into_iter().find(|id| id.index() >= self.bodies.len()) {
            let err = PhysicsError::UnknownBody(missing);
            error!("world: {err}");
            return Err(err);
        }
        self.constraints.push(constraint);
        Ok(())
    }

    #[inline]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    #[inline]
    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    #[inline]
    pub fn settings_mut(&mut self) -> &mut SimulationSettings {
        &mut self.settings
    }

    /// Advance the world by `dt` seconds.
    pub fn step(&mut self, dt: Real) {
        simulate_with_constraints(&mut self.bodies, &self.constraints, dt, &self.settings);
    }

    /// Nearest body hit by a ray. See [`cast_ray`].
    pub fn cast_ray(&self, origin: &Vec3, direction: &Vec3, max_distance: Real) -> Option<RayHit> {
        cast_ray(&self.bodies, origin, direction, max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ids_are_dense_and_stable() {
        let mut world = PhysicsWorld::default();
        let a = world.add_body(Body::sphere(1.0, false).unwrap());
        let b = world.add_body(Body::sphere(2.0, true).unwrap());

        assert_eq!((a, b), (BodyId(0), BodyId(1)));
        assert!(world.body(b).is_some_and(Body::is_fixed));
        assert!(world.body(BodyId(2)).is_none());
    }

    #[test]
    fn constraints_to_missing_bodies_are_rejected() {
        let mut world = PhysicsWorld::default();
        let a = world.add_body(Body::sphere(1.0, false).unwrap());
        let link = Constraint::mutual_orientation(a, BodyId(7), 0.0).unwrap();

        assert_eq!(world.add_constraint(link), Err(PhysicsError::UnknownBody(BodyId(7))));
        assert!(world.constraints().is_empty());
    }

    #[test]
    fn step_moves_bodies_through_body_mut() {
        let mut world = PhysicsWorld::new(SimulationSettings::default().with_gravity(Vec3::zeros()));
        let id = world.add_body(Body::sphere(0.5, false).unwrap());
        if let Some(body) = world.body_mut(id) {
            body.push(Vec3::new(1.0, 0.0, 0.0));
        }

        world.step(0.5);

        assert_relative_eq!(world.body(id).unwrap().position().x, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn world_ray_cast_reports_body_id() {
        let mut world = PhysicsWorld::default();
        world.add_body(Body::sphere(0.5, true).unwrap().with_position(Vec3::new(0.0, 0.0, -4.0)));
        let target = world.add_body(Body::sphere(0.5, true).unwrap().with_position(Vec3::new(0.0, 0.0, 4.0)));

        let hit = world.cast_ray(&Vec3::zeros(), &Vec3::z(), 10.0);

        assert_eq!(hit.map(|h| h.body), Some(target));
    }
}
