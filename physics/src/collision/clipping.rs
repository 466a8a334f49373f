/*!
Contact manifold generation from a penetration axis.

Given two overlapping colliders and the EPA axis (pointing from the first
into the second), this produces one or more contact point pairs:
- sphere involved: a single pair along the axis
- hull against hull, edges most aligned with the axis: a single pair at
  the closest points of the two edge lines
- otherwise: the incident face polygon is clipped against the side planes
  of the reference face (Sutherland-Hodgman), then points above the
  reference face are dropped

The reference face is whichever of the two candidate faces is better
aligned with the axis.
*/

use log::debug;

use crate::collider::{Collider, HullCollider};
use crate::collision::contact::Contact;
use crate::collision::support::{hull_support_index, support_point};
use crate::types::{Real, Vec3};

/// An edge pair must beat both faces by this much to be used.
const EDGE_PREFERENCE: Real = 1.0e-4;

/// Parallel edges (and zero-length cross products) below this are skipped.
const PARALLEL_EPS: Real = 1.0e-10;

/// Half-space `normal · (p - point) >= 0`.
#[derive(Clone, Copy, Debug)]
struct Plane {
    point: Vec3,
    normal: Vec3,
}

impl Plane {
    #[inline]
    fn contains(&self, p: &Vec3) -> bool {
        self.normal.dot(&(p - self.point)) >= 0.0
    }

    /// Crossing point of segment `from -> to` with the plane boundary.
    #[inline]
    fn intersect(&self, from: &Vec3, to: &Vec3) -> Vec3 {
        let along = to - from;
        let denom = self.normal.dot(&along);
        if denom.abs() < PARALLEL_EPS {
            return *from;
        }
        let t = self.normal.dot(&(self.point - from)) / denom;
        from + along * t
    }
}

/// Contact pairs for two overlapping colliders.
///
/// `axis` points from `a` into `b`, `depth` is the EPA penetration depth.
/// The returned contacts carry the normal `-axis` (from `b` toward `a`).
pub fn clip_contacts(a: &Collider, b: &Collider, axis: &Vec3, depth: Real) -> Vec<Contact> {
    match (a, b) {
        (Collider::Sphere(_), _) => {
            let point1 = support_point(a, axis);
            vec![Contact::new(point1, point1 - axis * depth, -axis)]
        }
        (_, Collider::Sphere(_)) => {
            let point2 = support_point(b, &-axis);
            vec![Contact::new(point2 + axis * depth, point2, -axis)]
        }
        (Collider::Hull(h1), Collider::Hull(h2)) => hull_hull(h1, h2, axis),
    }
}

struct EdgePair {
    alignment: Real,
    origin1: Vec3,
    dir1: Vec3,
    origin2: Vec3,
    dir2: Vec3,
}

fn hull_hull(h1: &HullCollider, h2: &HullCollider, axis: &Vec3) -> Vec<Contact> {
    let s1 = hull_support_index(h1, axis);
    let s2 = hull_support_index(h2, &-axis);
    let (Some((face1, dot1)), Some((face2, dot2))) =
        (best_face(h1, s1, axis), best_face(h2, s2, &-axis))
    else {
        debug!("clipping: support vertex belongs to no face");
        return Vec::new();
    };

    if let Some(edges) = best_edge_pair(h1, s1, h2, s2, axis) {
        if edges.alignment > dot1 + EDGE_PREFERENCE && edges.alignment > dot2 + EDGE_PREFERENCE {
            if let Some(contact) = edge_contact(&edges, axis) {
                return vec![contact];
            }
        }
    }

    if dot1 >= dot2 {
        face_contacts(h1, face1, h2, face2, axis, true)
    } else {
        face_contacts(h2, face2, h1, face1, axis, false)
    }
}

/// Face around vertex `vertex` whose normal best matches `direction`.
fn best_face(hull: &HullCollider, vertex: usize, direction: &Vec3) -> Option<(usize, Real)> {
    hull.vertex_faces(vertex)
        .iter()
        .map(|&f| (f, hull.world_normal(f).dot(direction)))
        .fold(None, |best: Option<(usize, Real)>, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        })
}

fn best_edge_pair(
    h1: &HullCollider,
    s1: usize,
    h2: &HullCollider,
    s2: usize,
    axis: &Vec3,
) -> Option<EdgePair> {
    let v1 = h1.world_vertices();
    let v2 = h2.world_vertices();
    let mut best: Option<EdgePair> = None;

    for &n1 in h1.vertex_neighbors(s1) {
        let dir1 = v1[s1] - v1[n1];
        for &n2 in h2.vertex_neighbors(s2) {
            let dir2 = v2[s2] - v2[n2];
            let Some(normal) = dir1.cross(&dir2).try_normalize(PARALLEL_EPS) else {
                continue;
            };
            let alignment = normal.dot(axis).abs();
            if best.as_ref().is_none_or(|b| alignment > b.alignment) {
                best = Some(EdgePair {
                    alignment,
                    origin1: v1[s1],
                    dir1,
                    origin2: v2[s2],
                    dir2,
                });
            }
        }
    }
    best
}

/// Closest points of the two edge lines.
fn edge_contact(edges: &EdgePair, axis: &Vec3) -> Option<Contact> {
    let (d1, d2) = (edges.dir1, edges.dir2);
    let r = edges.origin1 - edges.origin2;
    let a = d1.dot(&d1);
    let e = d2.dot(&d2);
    let b = d1.dot(&d2);
    let c = d1.dot(&r);
    let f = d2.dot(&r);

    let denom = a * e - b * b;
    if denom.abs() < PARALLEL_EPS || e < PARALLEL_EPS {
        return None;
    }
    let s = (b * f - c * e) / denom;
    let t = (b * s + f) / e;

    let point1 = edges.origin1 + d1 * s;
    let point2 = edges.origin2 + d2 * t;
    Some(Contact::new(point1, point2, -axis))
}

fn face_contacts(
    reference: &HullCollider,
    reference_face: usize,
    incident: &HullCollider,
    incident_face: usize,
    axis: &Vec3,
    reference_is_first: bool,
) -> Vec<Contact> {
    let mut polygon: Vec<Vec3> = incident.faces()[incident_face]
        .elements
        .iter()
        .map(|&i| incident.world_vertices()[i])
        .collect();

    let corner = |face: usize| reference.world_vertices()[reference.faces()[face].elements[0]];

    for &side in reference.face_neighbors(reference_face) {
        let plane = Plane {
            point: corner(side),
            normal: -reference.world_normal(side),
        };
        polygon = clip_polygon(&polygon, &plane);
        if polygon.is_empty() {
            debug!("clipping: incident face clipped away entirely");
            return Vec::new();
        }
    }

    let ref_normal = reference.world_normal(reference_face);
    let below = Plane {
        point: corner(reference_face),
        normal: -ref_normal,
    };

    polygon
        .into_iter()
        .filter(|p| below.contains(p))
        .filter_map(|p| {
            let offset = p - ref_normal * ref_normal.dot(&(p - below.point)) - p;
            // `offset` runs from the incident point up to the reference face.
            let penetration = if reference_is_first {
                -offset.dot(axis)
            } else {
                offset.dot(axis)
            };
            if penetration >= 0.0 {
                return None;
            }
            Some(if reference_is_first {
                Contact::new(p - axis * penetration, p, -axis)
            } else {
                Contact::new(p, p + axis * penetration, -axis)
            })
        })
        .collect()
}

/// One Sutherland-Hodgman pass: keep the part of `polygon` inside `plane`.
fn clip_polygon(polygon: &[Vec3], plane: &Plane) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(polygon.len() + 2);
    let Some(&last) = polygon.last() else {
        return out;
    };
    let mut prev = last;
    for &curr in polygon {
        match (plane.contains(&prev), plane.contains(&curr)) {
            (true, true) => out.push(curr),
            (false, true) => {
                out.push(plane.intersect(&prev, &curr));
                out.push(curr);
            }
            (true, false) => out.push(plane.intersect(&prev, &curr)),
            (false, false) => {}
        }
        prev = curr;
    }
    out
}
