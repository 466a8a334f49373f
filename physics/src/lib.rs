pub mod body;
pub mod broad;
pub mod collider;
pub mod collision;
pub mod error;
pub mod query;
pub mod settings;
pub mod solver;
pub mod types;
pub mod world;

pub use body::{Body, DEFAULT_MASS, Force, Material};
pub use collider::{Collider, HullCollider, HullFace, SphereCollider, inertia_tensor};
pub use collision::{Contact, body_contacts, get_contacts};
pub use error::{NarrowPhaseError, PhysicsError};
pub use query::{RayHit, cast_ray};
pub use settings::{
    ANGULAR_SLEEP_THRESHOLD, BROAD_PHASE_SLACK, DEACTIVATION_TIME, DEFAULT_NUM_POS_ITERS,
    DEFAULT_NUM_SUBSTEPS, GRAVITY_MPS2, LINEAR_SLEEP_THRESHOLD, SimulationSettings,
};
pub use solver::{
    AngleLimit, Constraint, ConstraintKind, HingeJoint, SphericalJoint, simulate,
    simulate_with_constraints,
};
pub use types::{Axis, BodyId, Mat3, Quat, Real, Vec3};
pub use world::PhysicsWorld;
