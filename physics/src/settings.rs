/*!
Solver settings and tolerances.

These constants centralize the parameters used by the broad phase, the
sleep bookkeeping and the XPBD substep loop. `SimulationSettings` carries
them at runtime so a world can override individual values.

Notes
- Distances are in meters, time in seconds, velocities in m/s and rad/s.
- The defaults mirror a 50 Hz fixed timestep with one substep and one
  position iteration. Stiff scenes (stacks, joints) want more substeps
  rather than more iterations.
*/

use crate::types::{Real, Vec3};

/// Gravity magnitude in meters per second squared (positive value).
/// Applied as a force `m * g` pointing down -Y on every non-fixed body.
pub const GRAVITY_MPS2: Real = 10.0;

/// Default number of XPBD substeps per `simulate` call.
pub const DEFAULT_NUM_SUBSTEPS: u32 = 1;

/// Default number of Gauss-Seidel position passes per substep.
pub const DEFAULT_NUM_POS_ITERS: u32 = 1;

/// Margin added to the sum of bounding radii when pairing bodies (meters).
/// Large enough to cover one step of motion at typical speeds.
pub const BROAD_PHASE_SLACK: Real = 0.1;

/// Linear speed below which a body counts as resting (m/s).
pub const LINEAR_SLEEP_THRESHOLD: Real = 0.10;

/// Angular speed below which a body counts as resting (rad/s).
pub const ANGULAR_SLEEP_THRESHOLD: Real = 0.10;

/// Time a whole island must stay below the sleep thresholds before it is
/// deactivated (seconds).
pub const DEACTIVATION_TIME: Real = 1.0;

/// Restitution is dropped when the approach speed is at most
/// `factor * |g| * h`. Keeps resting contacts from jittering.
pub const RESTITUTION_THRESHOLD_FACTOR: Real = 2.0;

/// Constraint errors at or below this magnitude are treated as satisfied.
pub const CONSTRAINT_EPSILON: Real = 1.0e-50;

/// Runtime configuration for `simulate_with_constraints` and `PhysicsWorld`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationSettings {
    /// Gravitational acceleration applied to every non-fixed body.
    pub gravity: Vec3,
    /// Substeps per call. Clamped to at least 1.
    pub num_substeps: u32,
    /// Position passes per substep. Clamped to at least 1.
    pub num_pos_iters: u32,
    /// When false, no contacts are generated; only external constraints are solved.
    pub enable_collisions: bool,
    pub broad_phase_slack: Real,
    pub linear_sleep_threshold: Real,
    pub angular_sleep_threshold: Real,
    pub deactivation_time: Real,
    pub restitution_threshold_factor: Real,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -GRAVITY_MPS2, 0.0),
            num_substeps: DEFAULT_NUM_SUBSTEPS,
            num_pos_iters: DEFAULT_NUM_POS_ITERS,
            enable_collisions: true,
            broad_phase_slack: BROAD_PHASE_SLACK,
            linear_sleep_threshold: LINEAR_SLEEP_THRESHOLD,
            angular_sleep_threshold: ANGULAR_SLEEP_THRESHOLD,
            deactivation_time: DEACTIVATION_TIME,
            restitution_threshold_factor: RESTITUTION_THRESHOLD_FACTOR,
        }
    }
}

impl SimulationSettings {
    #[inline]
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    #[inline]
    pub fn with_substeps(mut self, num_substeps: u32) -> Self {
        self.num_substeps = num_substeps;
        self
    }

    #[inline]
    pub fn with_pos_iters(mut self, num_pos_iters: u32) -> Self {
        self.num_pos_iters = num_pos_iters;
        self
    }

    #[inline]
    pub fn with_collisions(mut self, enable_collisions: bool) -> Self {
        self.enable_collisions = enable_collisions;
        self
    }

    #[inline]
    pub fn with_deactivation_time(mut self, seconds: Real) -> Self {
        self.deactivation_time = seconds;
        self
    }

    /// Substep count actually used by the solver.
    #[inline]
    pub const fn substeps(&self) -> u32 {
        if self.num_substeps == 0 { 1 } else { self.num_substeps }
    }

    /// Position iteration count actually used by the solver.
    #[inline]
    pub const fn pos_iters(&self) -> u32 {
        if self.num_pos_iters == 0 { 1 } else { self.num_pos_iters }
    }

    /// Approach speed at or below which restitution is ignored for substep `h`.
    #[inline]
    pub fn restitution_threshold(&self, h: Real) -> Real {
        self.restitution_threshold_factor * self.gravity.norm() * h
    }
}
