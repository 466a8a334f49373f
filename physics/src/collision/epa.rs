/*!
Expanding polytope algorithm.

Starts from the GJK tetrahedron and grows a polytope inside the Minkowski
difference until the face closest to the origin lies on its boundary. That
face's normal and distance are the penetration axis and depth.

Faces are kept outward-facing: since the origin is inside the polytope,
every face plane must have the origin behind it. When a face plane passes
through the origin, another polytope vertex decides the orientation.
*/

use log::trace;

use crate::collider::Collider;
use crate::collision::gjk::Simplex;
use crate::collision::support::minkowski_support;
use crate::error::NarrowPhaseError;
use crate::types::{Real, Vec3};

pub const EPA_MAX_ITERATIONS: usize = 100;

/// Convergence tolerance on the support distance (meters).
pub const EPA_TOLERANCE: Real = 1.0e-4;

/// Cross products shorter than this are treated as zero-area faces.
const MIN_FACE_AREA: Real = 1.0e-12;

/// Plane distances closer to zero than this cannot orient a face alone.
const ON_PLANE_EPS: Real = 1.0e-12;

/// Penetration axis and depth of two overlapping colliders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Penetration {
    /// Unit axis pointing from the first collider into the second.
    pub axis: Vec3,
    /// Overlap along `axis` (meters, positive).
    pub depth: Real,
}

#[derive(Clone, Copy, Debug)]
struct Face {
    indices: [usize; 3],
    normal: Vec3,
    distance: Real,
}

/// Run EPA from a GJK tetrahedron.
pub fn epa(a: &Collider, b: &Collider, simplex: &Simplex) -> Result<Penetration, NarrowPhaseError> {
    if simplex.len() != 4 {
        return Err(NarrowPhaseError::Degenerate);
    }
    let mut vertices: Vec<Vec3> = simplex.points().to_vec();
    let mut faces = Vec::with_capacity(16);
    for indices in [[0, 1, 2], [0, 2, 3], [0, 3, 1], [1, 2, 3]] {
        faces.push(make_face(&vertices, indices)?);
    }

    for iteration in 0..EPA_MAX_ITERATIONS {
        let closest = faces
            .iter()
            .min_by(|x, y| x.distance.total_cmp(&y.distance))
            .copied()
            .ok_or(NarrowPhaseError::Degenerate)?;

        let support = minkowski_support(a, b, &closest.normal);
        if support.dot(&closest.normal) - closest.distance < EPA_TOLERANCE {
            trace!("epa: converged after {} iterations", iteration + 1);
            return Ok(Penetration {
                axis: closest.normal,
                depth: closest.distance,
            });
        }

        // Drop every face that sees the new point and keep the horizon.
        let mut horizon: Vec<(usize, usize)> = Vec::new();
        let mut kept = Vec::with_capacity(faces.len() + 4);
        for face in faces {
            let centroid = face
                .indices
                .iter()
                .map(|&i| vertices[i])
                .sum::<Vec3>()
                / 3.0;
            if face.normal.dot(&(support - centroid)) > 0.0 {
                let [i, j, k] = face.indices;
                for edge in [(i, j), (j, k), (k, i)] {
                    toggle_edge(&mut horizon, edge);
                }
            } else {
                kept.push(face);
            }
        }

        vertices.push(support);
        let apex = vertices.len() - 1;
        for (i, j) in horizon {
            kept.push(make_face(&vertices, [i, j, apex])?);
        }
        faces = kept;
    }
    Err(NarrowPhaseError::EpaDidNotConverge)
}

/// Remove `edge` if it (or its reverse) is already listed, otherwise add it.
fn toggle_edge(edges: &mut Vec<(usize, usize)>, edge: (usize, usize)) {
    match edges
        .iter()
        .position(|&(p, q)| (p, q) == edge || (q, p) == edge)
    {
        Some(i) => {
            edges.swap_remove(i);
        }
        None => edges.push(edge),
    }
}

fn make_face(vertices: &[Vec3], indices: [usize; 3]) -> Result<Face, NarrowPhaseError> {
    let [a, b, c] = indices.map(|i| vertices[i]);
    let mut normal = (b - a)
        .cross(&(c - a))
        .try_normalize(MIN_FACE_AREA)
        .ok_or(NarrowPhaseError::Degenerate)?;
    let mut distance = normal.dot(&a);

    if distance < -ON_PLANE_EPS {
        normal = -normal;
        distance = -distance;
    } else if distance.abs() <= ON_PLANE_EPS {
        // The plane passes through the origin: the rest of the polytope must be behind it.
        let side = vertices
            .iter()
            .map(|v| normal.dot(v))
            .find(|d| d.abs() > ON_PLANE_EPS)
            .ok_or(NarrowPhaseError::Degenerate)?;
        if side > 0.0 {
            normal = -normal;
        }
        distance = distance.abs();
    }
    Ok(Face {
        indices,
        normal,
        distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::gjk::gjk;
    use crate::types::Quat;
    use approx::assert_relative_eq;

    fn placed(mut c: Collider, x: Real, y: Real, z: Real) -> Collider {
        c.update(&Vec3::new(x, y, z), &Quat::identity());
        c
    }

    fn penetration(a: &Collider, b: &Collider) -> Penetration {
        let simplex = gjk(a, b).unwrap().expect("colliders overlap");
        epa(a, b, &simplex).unwrap()
    }

    #[test]
    fn box_resting_into_floor_reports_vertical_axis() {
        let floor = placed(Collider::cuboid(5.0, 1.0, 5.0).unwrap(), 0.0, -1.0, 0.0);
        let crate_box = placed(Collider::cuboid(0.5, 0.5, 0.5).unwrap(), 0.2, 0.4, -0.1);

        let p = penetration(&crate_box, &floor);

        // The floor is below: the axis from the box into the floor points down.
        assert_relative_eq!(p.axis, -Vec3::y(), epsilon = 1e-4);
        assert_relative_eq!(p.depth, 0.1, epsilon = 1e-4);
    }

    #[test]
    fn sphere_into_box_side_reports_side_axis() {
        let wall = placed(Collider::cuboid(1.0, 3.0, 3.0).unwrap(), 0.0, 0.0, 0.0);
        let ball = placed(Collider::sphere(0.5).unwrap(), 1.3, 0.2, 0.1);

        let p = penetration(&wall, &ball);

        assert_relative_eq!(p.axis, Vec3::x(), epsilon = 1e-3);
        assert_relative_eq!(p.depth, 0.2, epsilon = 1e-3);
    }

    #[test]
    fn boxes_overlapping_along_z_report_z_depth() {
        let a = placed(Collider::cuboid(1.0, 1.0, 1.0).unwrap(), 0.0, 0.0, 0.0);
        let b = placed(Collider::cuboid(1.0, 1.0, 1.0).unwrap(), 0.0, 0.0, 0.6);

        let p = penetration(&a, &b);

        assert_relative_eq!(p.axis, Vec3::z(), epsilon = 1e-4);
        assert_relative_eq!(p.depth, 1.4, epsilon = 1e-4);

        let same_place = placed(Collider::cuboid(1.0, 1.0, 1.0).unwrap(), 0.0, 0.0, 0.0);
        assert_relative_eq!(penetration(&a, &same_place).depth, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn flat_simplex_is_degenerate_not_a_panic() {
        let a = placed(Collider::cuboid(1.0, 1.0, 1.0).unwrap(), 0.0, 0.0, 0.0);
        let b = placed(Collider::cuboid(1.0, 1.0, 1.0).unwrap(), 0.5, 0.0, 0.0);

        let flat = Simplex::from_points([
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
        ]);

        assert_eq!(epa(&a, &b, &flat), Err(NarrowPhaseError::Degenerate));
    }

    #[test]
    fn horizon_edges_cancel_when_shared() {
        let mut edges = Vec::new();
        toggle_edge(&mut edges, (0, 1));
        toggle_edge(&mut edges, (1, 2));
        toggle_edge(&mut edges, (1, 0));

        assert_eq!(edges, vec![(1, 2)]);
    }
}
