use log::{debug, warn};

use crate::body::Body;
use crate::collider::{Collider, SphereCollider};
use crate::collision::clipping::clip_contacts;
use crate::collision::epa::epa;
use crate::collision::gjk::gjk;
use crate::error::NarrowPhaseError;
use crate::types::{Real, Vec3};

/// Center distances below this make the sphere-sphere normal undefined.
const MIN_CENTER_DISTANCE: Real = 1.0e-12;

/// A pair of touching points, one on each collider.
///
/// `normal` points from the second collider toward the first. Contacts are
/// recomputed every substep and never persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// World-space point on the first collider.
    pub point1: Vec3,
    /// World-space point on the second collider.
    pub point2: Vec3,
    /// Unit normal from the second collider toward the first.
    pub normal: Vec3,
}

impl Contact {
    #[inline]
    pub fn new(point1: Vec3, point2: Vec3, normal: Vec3) -> Self {
        Self {
            point1,
            point2,
            normal,
        }
    }

    /// Penetration along the normal. Positive while the colliders overlap.
    #[inline]
    pub fn depth(&self) -> Real {
        (self.point2 - self.point1).dot(&self.normal)
    }
}

/// Contacts between two colliders, or the reason none could be computed.
pub fn try_get_contacts(a: &Collider, b: &Collider) -> Result<Vec<Contact>, NarrowPhaseError> {
    if let (Collider::Sphere(s1), Collider::Sphere(s2)) = (a, b) {
        return Ok(sphere_sphere(s1, s2)?.into_iter().collect());
    }
    let Some(simplex) = gjk(a, b)? else {
        return Ok(Vec::new());
    };
    let penetration = epa(a, b, &simplex)?;
    Ok(clip_contacts(a, b, &penetration.axis, penetration.depth))
}

/// Contacts between two colliders. Failures are logged and yield none.
pub fn get_contacts(a: &Collider, b: &Collider) -> Vec<Contact> {
    match try_get_contacts(a, b) {
        Ok(contacts) => contacts,
        Err(NarrowPhaseError::Degenerate) => {
            debug!("narrow phase: degenerate pair skipped");
            Vec::new()
        }
        Err(err) => {
            warn!("narrow phase: {err}, pair skipped this substep");
            Vec::new()
        }
    }
}

/// Contacts between every collider of `b1` and every collider of `b2`.
pub fn body_contacts(b1: &Body, b2: &Body) -> Vec<Contact> {
    let mut contacts = Vec::new();
    for c1 in b1.colliders() {
        for c2 in b2.colliders() {
            contacts.extend(get_contacts(c1, c2));
        }
    }
    contacts
}

/// Closed-form sphere pair test.
fn sphere_sphere(
    s1: &SphereCollider,
    s2: &SphereCollider,
) -> Result<Option<Contact>, NarrowPhaseError> {
    let delta = s1.center() - s2.center();
    let reach = s1.radius + s2.radius;
    let dist_sq = delta.norm_squared();
    if dist_sq >= reach * reach {
        return Ok(None);
    }
    let dist = dist_sq.sqrt();
    if dist < MIN_CENTER_DISTANCE {
        return Err(NarrowPhaseError::Degenerate);
    }
    let normal = delta / dist;
    Ok(Some(Contact::new(
        s1.center() - normal * s1.radius,
        s2.center() + normal * s2.radius,
        normal,
    )))
}
