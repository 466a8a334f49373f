/*!
XPBD solver.

- base:       shared positional/angular correction primitives
- constraint: the `Constraint` sum type and its per-variant solve steps
- joint:      hinge and spherical joints, angle limits
- pbd:        the substep loop (`simulate`, `simulate_with_constraints`)
*/

pub(crate) mod base;
pub mod constraint;
pub mod joint;
pub mod pbd;

pub use constraint::{
    CollisionConstraint, Constraint, ConstraintKind, MutualOrientationConstraint,
    PositionalConstraint,
};
pub use joint::{AngleLimit, HingeJoint, SphericalJoint};
pub use pbd::{simulate, simulate_with_constraints};
