//! Error types for body construction, joint validation and the narrow phase.

use thiserror::Error;

use crate::types::{BodyId, Real};

/// Errors reported when configuring bodies, joints or a world.
///
/// Nothing is partially constructed when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// A friction coefficient is outside `[0, 1]` or not finite.
    #[error("friction coefficients must lie in [0, 1] (static {static_friction}, dynamic {dynamic_friction})")]
    InvalidFriction {
        static_friction: Real,
        dynamic_friction: Real,
    },

    /// Dynamic friction exceeds static friction.
    ///
    /// Only ever logged as a warning; kept here so callers can match on it
    /// when they validate materials up front.
    #[error("dynamic friction {dynamic_friction} exceeds static friction {static_friction}")]
    FrictionOrdering {
        static_friction: Real,
        dynamic_friction: Real,
    },

    /// Restitution coefficient is outside `[0, 1]` or not finite.
    #[error("restitution must lie in [0, 1], got {0}")]
    InvalidRestitution(Real),

    /// Mass is zero, negative or not finite.
    #[error("mass must be positive and finite, got {0}")]
    InvalidMass(Real),

    /// A body was built without any collider.
    #[error("a body needs at least one collider")]
    EmptyColliders,

    /// A sphere radius or box half extent is zero, negative or not finite.
    #[error("shape dimensions must be positive and finite, got {0}")]
    InvalidDimension(Real),

    /// Vertex/index buffers do not describe a triangle mesh.
    #[error("invalid hull buffers: {0}")]
    InvalidHullBuffers(&'static str),

    /// Joint angle limits are inverted or outside `[-pi, pi]`.
    #[error("joint limits must satisfy -pi <= lower <= upper <= pi (lower {lower}, upper {upper})")]
    InvalidJointLimits { lower: Real, upper: Real },

    /// Constraint compliance is negative or not finite.
    #[error("compliance must be finite and non-negative, got {0}")]
    InvalidCompliance(Real),

    /// A constraint references a body that does not exist.
    #[error("constraint references invalid body {0}")]
    UnknownBody(BodyId),

    /// Both ends of a constraint are the same body.
    #[error("constraint links {0} to itself")]
    SameBody(BodyId),
}

/// Failures of GJK/EPA and the analytic sphere test.
///
/// These never leave the crate as errors: the contact layer logs them and
/// reports no contact for the pair this substep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NarrowPhaseError {
    #[error("GJK did not converge")]
    GjkDidNotConverge,
    #[error("EPA did not converge")]
    EpaDidNotConverge,
    /// Zero-length normal or a flat polytope.
    #[error("degenerate collision geometry")]
    Degenerate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let err = PhysicsError::InvalidRestitution(1.5);
        assert_eq!(err.to_string(), "restitution must lie in [0, 1], got 1.5");

        let err = PhysicsError::UnknownBody(BodyId(3));
        assert_eq!(err.to_string(), "constraint references invalid body body#3");

        let err = PhysicsError::SameBody(BodyId(2));
        assert_eq!(err.to_string(), "constraint links body#2 to itself");

        let err = PhysicsError::InvalidDimension(-1.0);
        assert_eq!(err.to_string(), "shape dimensions must be positive and finite, got -1");
    }
}
