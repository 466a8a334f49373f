/*!
Convex collider geometry.

A collider is either a sphere or a convex hull, described in the body's
local frame. Each collider keeps a world-space copy of the data the narrow
phase reads (sphere center, hull vertices and face normals). The copy is
refreshed from the owning body's pose with `Collider::update`.

Hull construction:
- vertices with identical coordinates are merged
- coplanar triangles that touch are fused into one polygonal face
- each face stores its boundary as an ordered vertex loop
- adjacency is precomputed (vertex to faces, vertex to hull-edge
  neighbors, face to faces sharing a vertex) for contact clipping

The mesh is assumed convex with consistent counter-clockwise winding seen
from outside. That is not validated.
*/

use std::collections::HashMap;

use log::debug;

use crate::error::PhysicsError;
use crate::types::{Mat3, Quat, Real, Vec3};

/// Two unit normals closer than this (as `1 - dot`) are treated as coplanar.
const COPLANAR_EPS: Real = 1.0e-6;

/// Corners of an axis-aligned box with half extents (1, 1, 1).
const BOX_CORNERS: [[Real; 3]; 8] = [
    [-1.0, 1.0, 1.0],
    [-1.0, -1.0, 1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, -1.0],
    [1.0, 1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, -1.0],
    [1.0, -1.0, -1.0],
];

/// Triangles of the box, counter-clockwise seen from outside.
const BOX_INDICES: [usize; 36] = [
    4, 2, 0, 4, 6, 2, 2, 7, 3, 2, 6, 7, 6, 5, 7, 6, 4, 5, 1, 7, 5, 1, 3, 7, 0, 3, 1, 0, 2, 3, 4, 1,
    5, 4, 0, 1,
];

/// A sphere centered on the body origin.
#[derive(Clone, Debug, PartialEq)]
pub struct SphereCollider {
    pub radius: Real,
    /// World-space center, refreshed by `Collider::update`.
    center: Vec3,
}

impl SphereCollider {
    #[inline]
    pub fn center(&self) -> Vec3 {
        self.center
    }
}

/// A polygonal face of a hull.
#[derive(Clone, Debug, PartialEq)]
pub struct HullFace {
    /// Vertex indices of the face boundary, in winding order.
    pub elements: Vec<usize>,
    /// Outward unit normal in the local frame.
    pub normal: Vec3,
}

/// A convex polyhedron.
#[derive(Clone, Debug, PartialEq)]
pub struct HullCollider {
    vertices: Vec<Vec3>,
    faces: Vec<HullFace>,
    vertex_to_faces: Vec<Vec<usize>>,
    vertex_to_neighbors: Vec<Vec<usize>>,
    face_to_neighbors: Vec<Vec<usize>>,
    world_vertices: Vec<Vec3>,
    world_normals: Vec<Vec3>,
}

impl HullCollider {
    /// Build a hull from a triangle mesh.
    ///
    /// Rejects index buffers whose length is not a positive multiple of 3,
    /// indices past the end of `vertices`, and non-finite coordinates.
    pub fn from_mesh(vertices: &[Vec3], indices: &[usize]) -> Result<Self, PhysicsError> {
        if vertices.is_empty() {
            return Err(PhysicsError::InvalidHullBuffers("vertex buffer is empty"));
        }
        if indices.is_empty() || indices.len() % 3 != 0 {
            return Err(PhysicsError::InvalidHullBuffers(
                "index count must be a positive multiple of 3",
            ));
        }
        if indices.iter().any(|&i| i >= vertices.len()) {
            return Err(PhysicsError::InvalidHullBuffers("index out of range"));
        }
        if vertices.iter().any(|v| !v.iter().all(|c| c.is_finite())) {
            return Err(PhysicsError::InvalidHullBuffers("non-finite vertex"));
        }

        let hull = Self::build(vertices, indices);
        if hull.faces.is_empty() {
            return Err(PhysicsError::InvalidHullBuffers("mesh has no non-degenerate triangle"));
        }
        Ok(hull)
    }

    /// Axis-aligned box with the given half extents.
    ///
    /// Every extent must be positive and finite.
    pub fn cuboid(hx: Real, hy: Real, hz: Real) -> Result<Self, PhysicsError> {
        check_dimensions(&[hx, hy, hz])?;
        let corners: Vec<Vec3> = BOX_CORNERS
            .iter()
            .map(|c| Vec3::new(c[0] * hx, c[1] * hy, c[2] * hz))
            .collect();
        Ok(Self::build(&corners, &BOX_INDICES))
    }

    pub(crate) fn build(raw_vertices: &[Vec3], indices: &[usize]) -> Self {
        let (vertices, remap) = dedup_vertices(raw_vertices);

        let mut triangles: Vec<[usize; 3]> = Vec::with_capacity(indices.len() / 3);
        let mut normals: Vec<Vec3> = Vec::with_capacity(indices.len() / 3);
        for tri in indices.chunks_exact(3) {
            let t = [remap[tri[0]], remap[tri[1]], remap[tri[2]]];
            let n = (vertices[t[1]] - vertices[t[0]]).cross(&(vertices[t[2]] - vertices[t[0]]));
            match n.try_normalize(Real::EPSILON) {
                Some(n) => {
                    triangles.push(t);
                    normals.push(n);
                }
                None => debug!("hull: skipping degenerate triangle {t:?}"),
            }
        }

        let mut vertex_to_triangles: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
        for (ti, t) in triangles.iter().enumerate() {
            for &v in t {
                vertex_to_triangles[v].push(ti);
            }
        }

        let faces = merge_coplanar(&triangles, &normals, &vertex_to_triangles);

        let mut vertex_to_faces: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
        let mut vertex_to_neighbors: Vec<Vec<usize>> = vec![Vec::new(); vertices.len()];
        for (fi, face) in faces.iter().enumerate() {
            let n = face.elements.len();
            for (k, &v) in face.elements.iter().enumerate() {
                vertex_to_faces[v].push(fi);
                let next = face.elements[(k + 1) % n];
                push_unique(&mut vertex_to_neighbors[v], next);
                push_unique(&mut vertex_to_neighbors[next], v);
            }
        }

        let face_to_neighbors = (0..faces.len())
            .map(|fi| {
                let mut neighbors = Vec::new();
                for &v in &faces[fi].elements {
                    for &other in &vertex_to_faces[v] {
                        if other != fi {
                            push_unique(&mut neighbors, other);
                        }
                    }
                }
                neighbors
            })
            .collect();

        let world_normals = faces.iter().map(|f| f.normal).collect();
        Self {
            world_vertices: vertices.clone(),
            vertices,
            faces,
            vertex_to_faces,
            vertex_to_neighbors,
            face_to_neighbors,
            world_normals,
        }
    }

    /// Local-space vertices.
    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    #[inline]
    pub fn faces(&self) -> &[HullFace] {
        &self.faces
    }

    /// World-space vertices as of the last `update`.
    #[inline]
    pub fn world_vertices(&self) -> &[Vec3] {
        &self.world_vertices
    }

    /// World-space normal of face `face` as of the last `update`.
    #[inline]
    pub fn world_normal(&self, face: usize) -> Vec3 {
        self.world_normals[face]
    }

    /// Faces that contain vertex `vertex`.
    #[inline]
    pub fn vertex_faces(&self, vertex: usize) -> &[usize] {
        &self.vertex_to_faces[vertex]
    }

    /// Vertices joined to `vertex` by a hull edge.
    #[inline]
    pub fn vertex_neighbors(&self, vertex: usize) -> &[usize] {
        &self.vertex_to_neighbors[vertex]
    }

    /// Faces sharing at least one vertex with `face`.
    #[inline]
    pub fn face_neighbors(&self, face: usize) -> &[usize] {
        &self.face_to_neighbors[face]
    }

    fn update(&mut self, position: &Vec3, rotation: &Quat) {
        for (world, local) in self.world_vertices.iter_mut().zip(&self.vertices) {
            *world = rotation * local + position;
        }
        for (world, face) in self.world_normals.iter_mut().zip(&self.faces) {
            *world = rotation * face.normal;
        }
    }
}

/// Convex collision geometry attached to a body.
#[derive(Clone, Debug, PartialEq)]
pub enum Collider {
    Sphere(SphereCollider),
    Hull(HullCollider),
}

impl Collider {
    /// Sphere centered on the body origin. The radius must be positive.
    pub fn sphere(radius: Real) -> Result<Self, PhysicsError> {
        check_dimensions(&[radius])?;
        Ok(Collider::Sphere(SphereCollider {
            radius,
            center: Vec3::zeros(),
        }))
    }

    #[inline]
    pub fn cuboid(hx: Real, hy: Real, hz: Real) -> Result<Self, PhysicsError> {
        HullCollider::cuboid(hx, hy, hz).map(Collider::Hull)
    }

    /// Hull from caller-supplied vertex and triangle index buffers.
    pub fn convex_hull(vertices: &[Vec3], indices: &[usize]) -> Result<Self, PhysicsError> {
        HullCollider::from_mesh(vertices, indices).map(Collider::Hull)
    }

    /// Refresh the world-space copy from the owning body's pose.
    pub fn update(&mut self, position: &Vec3, rotation: &Quat) {
        match self {
            Collider::Sphere(s) => s.center = *position,
            Collider::Hull(h) => h.update(position, rotation),
        }
    }

    /// Radius of the smallest origin-centered sphere enclosing the collider.
    pub fn bounding_radius(&self) -> Real {
        match self {
            Collider::Sphere(s) => s.radius,
            Collider::Hull(h) => h.vertices.iter().map(|v| v.norm()).fold(0.0, Real::max),
        }
    }
}

fn check_dimensions(dimensions: &[Real]) -> Result<(), PhysicsError> {
    match dimensions.iter().find(|d| !(d.is_finite() && **d > 0.0)) {
        Some(&bad) => Err(PhysicsError::InvalidDimension(bad)),
        None => Ok(()),
    }
}

/// Local-space inertia tensor of a set of colliders sharing `mass`.
///
/// A lone sphere gets the solid-sphere tensor. Otherwise the mass is split
/// evenly between colliders, spheres contribute a solid-sphere tensor and
/// hulls spread their share over their vertices as point masses.
pub fn inertia_tensor(colliders: &[Collider], mass: Real) -> Mat3 {
    if let [Collider::Sphere(s)] = colliders {
        return solid_sphere_inertia(s.radius, mass);
    }

    let share = mass / colliders.len().max(1) as Real;
    let mut tensor = Mat3::zeros();
    for collider in colliders {
        match collider {
            Collider::Sphere(s) => tensor += solid_sphere_inertia(s.radius, share),
            Collider::Hull(h) => {
                let m = share / h.vertices.len() as Real;
                for v in &h.vertices {
                    tensor += (Mat3::identity() * v.norm_squared() - v * v.transpose()) * m;
                }
            }
        }
    }
    tensor
}

#[inline]
fn solid_sphere_inertia(radius: Real, mass: Real) -> Mat3 {
    Mat3::identity() * (2.0 / 5.0 * mass * radius * radius)
}

fn dedup_vertices(raw: &[Vec3]) -> (Vec<Vec3>, Vec<usize>) {
    // Adding 0.0 folds -0.0 into +0.0 so both hash alike.
    let key = |v: &Vec3| [(v.x + 0.0).to_bits(), (v.y + 0.0).to_bits(), (v.z + 0.0).to_bits()];

    let mut seen: HashMap<[u64; 3], usize> = HashMap::with_capacity(raw.len());
    let mut unique = Vec::with_capacity(raw.len());
    let remap = raw
        .iter()
        .map(|v| {
            *seen.entry(key(v)).or_insert_with(|| {
                unique.push(*v);
                unique.len() - 1
            })
        })
        .collect();
    (unique, remap)
}

fn merge_coplanar(
    triangles: &[[usize; 3]],
    normals: &[Vec3],
    vertex_to_triangles: &[Vec<usize>],
) -> Vec<HullFace> {
    let mut visited = vec![false; triangles.len()];
    let mut faces = Vec::new();

    for seed in 0..triangles.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;

        let target = normals[seed];
        let mut members = vec![seed];
        let mut stack = vec![seed];
        while let Some(t) = stack.pop() {
            for &v in &triangles[t] {
                for &other in &vertex_to_triangles[v] {
                    if !visited[other] && (normals[other].dot(&target) - 1.0).abs() < COPLANAR_EPS {
                        visited[other] = true;
                        members.push(other);
                        stack.push(other);
                    }
                }
            }
        }

        faces.push(HullFace {
            elements: boundary_loop(&members, triangles),
            normal: target,
        });
    }
    faces
}

/// Ordered boundary of a set of coplanar triangles.
///
/// Interior edges appear once per adjacent triangle and cancel out.
fn boundary_loop(members: &[usize], triangles: &[[usize; 3]]) -> Vec<usize> {
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for &t in members {
        let [a, b, c] = triangles[t];
        for edge in [(a, b), (b, c), (c, a)] {
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
    }

    let Some(&(start, mut current)) = edges.first() else {
        return Vec::new();
    };
    let mut elements = vec![start];
    let mut used = vec![false; edges.len()];
    used[0] = true;

    while current != start {
        let next = edges.iter().enumerate().find_map(|(i, &(p, q))| {
            if used[i] {
                None
            } else if p == current {
                Some((i, q))
            } else if q == current {
                Some((i, p))
            } else {
                None
            }
        });
        let Some((i, to)) = next else {
            debug!("hull: face boundary is not a closed loop, keeping unordered vertices");
            let mut fallback: Vec<usize> = Vec::new();
            for &(p, q) in &edges {
                push_unique(&mut fallback, p);
                push_unique(&mut fallback, q);
            }
            return fallback;
        };
        used[i] = true;
        elements.push(current);
        current = to;
    }
    elements
}

#[inline]
fn push_unique(list: &mut Vec<usize>, value: usize) {
    if !list.contains(&value) {
        list.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube() -> HullCollider {
        HullCollider::cuboid(0.5, 0.5, 0.5).unwrap()
    }

    #[test]
    fn cube_merges_into_six_quad_faces() {
        let cube = unit_cube();

        assert_eq!(cube.vertices().len(), 8);
        assert_eq!(cube.faces().len(), 6);
        for face in cube.faces() {
            assert_eq!(face.elements.len(), 4);
        }
    }

    #[test]
    fn cube_face_boundaries_are_closed_loops_of_edges() {
        let cube = unit_cube();

        for face in cube.faces() {
            let n = face.elements.len();
            for k in 0..n {
                let a = cube.vertices()[face.elements[k]];
                let b = cube.vertices()[face.elements[(k + 1) % n]];
                // Consecutive loop entries are joined by a cube edge, never a diagonal.
                assert_relative_eq!((a - b).norm(), 1.0, epsilon = 1e-12);
                // And they lie on the face plane.
                assert_relative_eq!(face.normal.dot(&a), 0.5, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn cube_adjacency_matches_topology() {
        let cube = unit_cube();

        for v in 0..8 {
            assert_eq!(cube.vertex_faces(v).len(), 3);
            assert_eq!(cube.vertex_neighbors(v).len(), 3);
        }
        for f in 0..6 {
            // Every face touches the four side faces, never the opposite one.
            assert_eq!(cube.face_neighbors(f).len(), 4);
        }
    }

    #[test]
    fn cube_normals_point_outward() {
        let cube = unit_cube();
        for face in cube.faces() {
            let centroid: Vec3 = face
                .elements
                .iter()
                .map(|&i| cube.vertices()[i])
                .sum::<Vec3>()
                / face.elements.len() as Real;
            assert!(face.normal.dot(&centroid) > 0.0);
        }
    }

    #[test]
    fn duplicated_vertices_are_merged() {
        // A tetrahedron given with one vertex per triangle corner.
        let p = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let tris = [[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];
        let vertices: Vec<Vec3> = tris.iter().flat_map(|t| t.iter().map(|&i| p[i])).collect();
        let indices: Vec<usize> = (0..12).collect();

        let hull = HullCollider::from_mesh(&vertices, &indices).unwrap();

        assert_eq!(hull.vertices().len(), 4);
        assert_eq!(hull.faces().len(), 4);
    }

    #[test]
    fn invalid_buffers_are_rejected() {
        let v = [Vec3::zeros(), Vec3::x(), Vec3::y()];

        assert!(matches!(
            HullCollider::from_mesh(&v, &[0, 1]),
            Err(PhysicsError::InvalidHullBuffers(_))
        ));
        assert!(matches!(
            HullCollider::from_mesh(&v, &[0, 1, 5]),
            Err(PhysicsError::InvalidHullBuffers(_))
        ));
        assert!(matches!(
            HullCollider::from_mesh(&[], &[0, 1, 2]),
            Err(PhysicsError::InvalidHullBuffers(_))
        ));
    }

    #[test]
    fn shapes_need_positive_finite_dimensions() {
        assert_eq!(
            Collider::cuboid(0.0, 0.0, 0.0).err(),
            Some(PhysicsError::InvalidDimension(0.0))
        );
        assert_eq!(
            Collider::cuboid(1.0, -2.0, 1.0).err(),
            Some(PhysicsError::InvalidDimension(-2.0))
        );
        assert!(matches!(
            Collider::cuboid(1.0, 1.0, Real::INFINITY),
            Err(PhysicsError::InvalidDimension(_))
        ));
        assert!(matches!(
            Collider::sphere(Real::NAN),
            Err(PhysicsError::InvalidDimension(_))
        ));
        assert_eq!(
            Collider::sphere(-0.5).err(),
            Some(PhysicsError::InvalidDimension(-0.5))
        );
    }

    #[test]
    fn update_moves_world_copy_only() {
        let mut collider = Collider::cuboid(1.0, 2.0, 3.0).unwrap();
        let rot = Quat::from_axis_angle(&Vec3::y_axis(), std::f64::consts::FRAC_PI_2);
        collider.update(&Vec3::new(10.0, 0.0, 0.0), &rot);

        let Collider::Hull(hull) = &collider else {
            panic!("expected a hull");
        };
        for (local, world) in hull.vertices().iter().zip(hull.world_vertices()) {
            assert_relative_eq!(*world, rot * local + Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-12);
        }
        for (i, face) in hull.faces().iter().enumerate() {
            assert_relative_eq!(hull.world_normal(i), rot * face.normal, epsilon = 1e-12);
        }
    }

    #[test]
    fn sphere_inertia_is_isotropic() {
        let tensor = inertia_tensor(&[Collider::sphere(2.0).unwrap()], 3.0);
        let expected = 2.0 / 5.0 * 3.0 * 4.0;

        assert_relative_eq!(tensor, Mat3::identity() * expected, epsilon = 1e-12);
    }

    #[test]
    fn cube_point_mass_inertia_is_diagonal() {
        let tensor = inertia_tensor(&[Collider::cuboid(1.0, 1.0, 1.0).unwrap()], 1.0);

        // Eight corners of mass 1/8 at distance sqrt(2) from each axis.
        assert_relative_eq!(tensor, Mat3::identity() * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn bounding_radius_covers_farthest_vertex() {
        assert_eq!(Collider::sphere(0.75).unwrap().bounding_radius(), 0.75);
        assert_relative_eq!(
            Collider::cuboid(1.0, 2.0, 2.0).unwrap().bounding_radius(),
            3.0,
            epsilon = 1e-12
        );
    }
}
