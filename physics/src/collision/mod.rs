/*!
Narrow phase.

Turns a broad-phase pair into contact points. The code is split for clarity:

- support:  support mappings over the world-space collider copies
- gjk:      overlap test on the Minkowski difference
- epa:      penetration axis and depth from the GJK tetrahedron
- clipping: contact manifold from the penetration axis
- contact:  the `Contact` type, the sphere-sphere shortcut and the entry points

Every function here reads the cached world-space collider data, so the
owning bodies must have refreshed their colliders for the current pose.
*/

pub mod clipping;
pub mod contact;
pub mod epa;
pub mod gjk;
pub mod support;

// Re-export commonly used types and functions.
pub use contact::{Contact, body_contacts, get_contacts, try_get_contacts};
pub use epa::{Penetration, epa};
pub use gjk::{Simplex, collides, gjk};
