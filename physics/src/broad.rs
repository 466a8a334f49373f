//! Broad phase: bounding-sphere pair search and simulation islands.
//!
//! Pairs are found with an O(n²) scan over bounding spheres. That is fine
//! for tens to low hundreds of bodies. Islands group bodies that touch or
//! are jointed so that sleep is decided for the whole group at once.

use log::trace;

use crate::body::Body;
use crate::solver::Constraint;
use crate::types::{BodyId, Real};

/// An unordered candidate pair, always stored with `a < b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BroadPair {
    pub a: BodyId,
    pub b: BodyId,
}

/// Every pair `(i, j)`, `i < j`, whose bounding spheres are within `slack`.
pub fn collision_pairs(bodies: &[Body], slack: Real) -> Vec<BroadPair> {
    let mut pairs = Vec::new();
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (b1, b2) = (&bodies[i], &bodies[j]);
            let reach = b1.bounding_radius() + b2.bounding_radius() + slack;
            if (b1.position() - b2.position()).norm_squared() <= reach * reach {
                pairs.push(BroadPair {
                    a: BodyId(i),
                    b: BodyId(j),
                });
            }
        }
    }
    pairs
}

/// Disjoint-set forest over body indices.
///
/// Uses path halving and union by size.
#[derive(Clone, Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

/// Group non-fixed bodies connected through broad pairs or constraints.
///
/// Fixed bodies never join an island, so a floor does not chain every body
/// resting on it into one group. Islands are ordered by their smallest member.
pub fn simulation_islands(
    bodies: &[Body],
    pairs: &[BroadPair],
    constraints: &[Constraint],
) -> Vec<Vec<BodyId>> {
    let mut sets = UnionFind::new(bodies.len());
    let movable = |id: BodyId| bodies.get(id.0).is_some_and(|b| !b.is_fixed());

    for pair in pairs {
        if movable(pair.a) && movable(pair.b) {
            sets.union(pair.a.0, pair.b.0);
        }
    }
    for c in constraints {
        let (a, b) = c.bodies();
        if movable(a) && movable(b) {
            sets.union(a.0, b.0);
        }
    }

    let mut slot_of_root: Vec<Option<usize>> = vec![None; bodies.len()];
    let mut islands: Vec<Vec<BodyId>> = Vec::new();
    for (i, body) in bodies.iter().enumerate() {
        if body.is_fixed() {
            continue;
        }
        let root = sets.find(i);
        let slot = *slot_of_root[root].get_or_insert_with(|| {
            islands.push(Vec::new());
            islands.len() - 1
        });
        islands[slot].push(BodyId(i));
    }
    trace!("broad: {} bodies in {} islands", bodies.len(), islands.len());
    islands
}
