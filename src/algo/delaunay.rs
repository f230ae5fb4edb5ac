//! 3D Delaunay tetrahedralization of a point set.
//!
//! [`IncrementalDelaunay`] inserts points one at a time in a seeded random
//! order (Bowyer-Watson). Each point is located by a visibility walk, the
//! tetrahedra whose circumsphere strictly contains it are removed, and the
//! resulting cavity is re-filled by coning its boundary to the point. The
//! convex hull is closed by a symbolic vertex at infinity, so hull cells are
//! never lost to a finite bounding tetrahedron.
//! Orientation and in-sphere decisions use the adaptive exact predicates of
//! the `robust` crate.
//!
//! The output is the raw Delaunay cell set: no tetrahedron is filtered or
//! classified. Cells are positively oriented (right-handed).
//!
//! # Example
//!
//! ```
//! use nalgebra::DMatrix;
//! use tetsample::algo::tetrahedralize;
//!
//! let vertices = DMatrix::from_row_slice(4, 3, &[
//!     0.0, 0.0, 0.0,
//!     1.0, 0.0, 0.0,
//!     0.0, 1.0, 0.0,
//!     0.0, 0.0, 1.0,
//! ]);
//! let tets = tetrahedralize(&vertices).unwrap();
//! assert_eq!(tets.nrows(), 1);
//! assert_eq!(tets.ncols(), 4);
//! ```

use std::collections::HashMap;

use nalgebra::{DMatrix, Point3};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use robust::{Coord, Coord3D};

use crate::error::{MeshError, Result};
use crate::mesh::tets_to_matrix;

/// Vertex at infinity. Every convex hull facet is closed by a tetrahedron
/// joining it to this vertex.
const INFINITE: usize = usize::MAX;

/// Unset neighbour slot while a cavity is being re-filled.
const NONE: usize = usize::MAX;

/// Operations a Delaunay backend provides to the tetrahedralizer.
pub trait DelaunayService {
    /// Triangulate `points`, replacing any previous result.
    fn set_vertices(&mut self, points: &[Point3<f64>]) -> Result<()>;

    /// Number of points last passed to [`set_vertices`](Self::set_vertices).
    fn nb_vertices(&self) -> usize;

    /// Number of tetrahedra.
    fn nb_cells(&self) -> usize;

    /// Input index of local vertex `lv` (0..4) of tetrahedron `cell`.
    fn cell_vertex(&self, cell: usize, lv: usize) -> usize;
}

/// Randomized incremental Delaunay tetrahedralization.
#[derive(Debug, Clone, Default)]
pub struct IncrementalDelaunay {
    seed: u64,
    nb_vertices: usize,
    cells: Vec<[usize; 4]>,
    skipped: usize,
}

impl IncrementalDelaunay {
    /// Create an empty triangulation with insertion seed 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the seed of the insertion order.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The tetrahedra, as input point indices.
    pub fn cells(&self) -> &[[usize; 4]] {
        &self.cells
    }

    /// Number of points skipped because they coincide with an inserted point.
    pub fn nb_skipped(&self) -> usize {
        self.skipped
    }
}

impl DelaunayService for IncrementalDelaunay {
    fn set_vertices(&mut self, points: &[Point3<f64>]) -> Result<()> {
        if let Some(bad) = points.iter().position(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(MeshError::invalid_param(
                "point",
                bad,
                "coordinates must be finite",
            ));
        }

        self.nb_vertices = points.len();
        self.cells.clear();
        self.skipped = 0;

        let mut rng = Pcg64::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..points.len()).collect();
        order.shuffle(&mut rng);

        let mut tri = Triangulation::new(points);
        let Some(seeds) = tri.seed(&order) else {
            log::debug!(
                "Delaunay: {} points span less than a volume, nothing to triangulate",
                points.len()
            );
            return Ok(());
        };

        for &p in order.iter().filter(|p| !seeds.contains(p)) {
            if !tri.insert(p, &mut rng) {
                self.skipped += 1;
            }
        }
        if self.skipped > 0 {
            log::warn!("Delaunay: skipped {} duplicate points", self.skipped);
        }

        self.cells = tri.finite_cells();
        log::debug!(
            "Delaunay: {} points, {} tetrahedra",
            points.len(),
            self.cells.len()
        );
        Ok(())
    }

    fn nb_vertices(&self) -> usize {
        self.nb_vertices
    }

    fn nb_cells(&self) -> usize {
        self.cells.len()
    }

    fn cell_vertex(&self, cell: usize, lv: usize) -> usize {
        self.cells[cell][lv]
    }
}

/// A tetrahedron of the triangulation. `n[i]` is the neighbour across the
/// face opposite `v[i]`.
///
/// Finite tetrahedra have `orient3d(v0, v1, v2, v3) > 0`. For a tetrahedron
/// holding [`INFINITE`] at slot `k`, substituting a point beyond its hull
/// facet for the infinite vertex gives a positive orientation.
#[derive(Debug, Clone)]
struct Tet {
    v: [usize; 4],
    n: [usize; 4],
    alive: bool,
}

impl Tet {
    fn infinite_slot(&self) -> Option<usize> {
        self.v.iter().position(|&v| v == INFINITE)
    }
}

/// Triangulation of the input points closed by the vertex at infinity, so
/// that every tetrahedron has four neighbours.
struct Triangulation {
    points: Vec<Coord3D<f64>>,
    tets: Vec<Tet>,
    mark: Vec<usize>,
    stamp: usize,
    last: usize,
}

impl Triangulation {
    fn new(input: &[Point3<f64>]) -> Self {
        Self {
            points: input.iter().map(coord).collect(),
            tets: Vec::new(),
            mark: Vec::new(),
            stamp: 0,
            last: 0,
        }
    }

    /// Build the first tetrahedron from the earliest four affinely
    /// independent points of `order`, plus the four infinite tetrahedra on
    /// its faces. Returns the seed points, or `None` if all points are
    /// coplanar.
    fn seed(&mut self, order: &[usize]) -> Option<[usize; 4]> {
        let pts = &self.points;
        let a = *order.first()?;
        let b = order.iter().copied().find(|&i| !coincide(pts[a], pts[i]))?;
        let c = order
            .iter()
            .copied()
            .find(|&i| !collinear(pts[a], pts[b], pts[i]))?;
        let d = order
            .iter()
            .copied()
            .find(|&i| self.orient([a, b, c, i]) != 0.0)?;

        let mut v = [a, b, c, d];
        if self.orient(v) < 0.0 {
            v.swap(2, 3);
        }
        let first = self.push(Tet {
            v,
            n: [1, 2, 3, 4],
            alive: true,
        });

        let mut open_faces = HashMap::new();
        for i in 0..4 {
            let mut u = v;
            u[i] = INFINITE;
            // Reverse the facet so the infinite vertex lies on its outer side.
            let (j, k) = match i {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            };
            u.swap(j, k);
            let mut n = [NONE; 4];
            n[i] = first;
            let t = self.push(Tet {
                v: u,
                n,
                alive: true,
            });
            self.link_faces(&mut open_faces, t, i);
        }

        self.last = first;
        Some(v)
    }

    fn push(&mut self, tet: Tet) -> usize {
        self.tets.push(tet);
        self.mark.push(0);
        self.tets.len() - 1
    }

    /// Pair every face of `t` except the one opposite `skip` with its twin
    /// in `open_faces`, or leave it there for a later tetrahedron.
    fn link_faces(
        &mut self,
        open_faces: &mut HashMap<[usize; 3], (usize, usize)>,
        t: usize,
        skip: usize,
    ) {
        for j in (0..4).filter(|&j| j != skip) {
            let key = face_key(self.tets[t].v, j);
            match open_faces.remove(&key) {
                Some((other, oj)) => {
                    self.tets[t].n[j] = other;
                    self.tets[other].n[oj] = t;
                }
                None => {
                    open_faces.insert(key, (t, j));
                }
            }
        }
    }

    fn orient(&self, v: [usize; 4]) -> f64 {
        robust::orient3d(
            self.points[v[0]],
            self.points[v[1]],
            self.points[v[2]],
            self.points[v[3]],
        )
    }

    /// Orientation of tetrahedron `t` with local vertex `i` replaced by `p`.
    fn orient_at(&self, t: usize, i: usize, p: usize) -> f64 {
        let mut v = self.tets[t].v;
        v[i] = p;
        self.orient(v)
    }

    fn insphere(&self, v: [usize; 4], p: usize) -> f64 {
        robust::insphere(
            self.points[v[0]],
            self.points[v[1]],
            self.points[v[2]],
            self.points[v[3]],
            self.points[p],
        )
    }

    /// Whether `p` lies strictly inside the circumsphere of `t`.
    ///
    /// The circumsphere of an infinite tetrahedron is the open half-space
    /// beyond its hull facet, plus the open circumdisk of the facet itself.
    fn in_conflict(&self, t: usize, p: usize) -> bool {
        let tet = &self.tets[t];
        let Some(k) = tet.infinite_slot() else {
            return self.insphere(tet.v, p) > 0.0;
        };

        let side = self.orient_at(t, k, p);
        if side != 0.0 {
            return side > 0.0;
        }
        // Any sphere through the facet cuts its plane in the circumcircle,
        // so the finite tetrahedron behind the facet decides.
        let inner = tet.n[k];
        self.insphere(self.tets[inner].v, p) > 0.0
    }

    /// Visibility walk from the last finite tetrahedron. Returns a finite
    /// tetrahedron containing `p`, or an infinite one whose hull facet `p`
    /// lies strictly beyond.
    fn locate<R: Rng>(&self, p: usize, rng: &mut R) -> Option<usize> {
        let mut t = self.last;
        for _ in 0..=self.tets.len() {
            let tet = &self.tets[t];
            if let Some(k) = tet.infinite_slot() {
                if self.orient_at(t, k, p) > 0.0 {
                    return Some(t);
                }
                t = tet.n[k];
                continue;
            }

            let offset = rng.gen_range(0..4);
            match (0..4)
                .map(|k| (k + offset) % 4)
                .find(|&i| self.orient_at(t, i, p) < 0.0)
            {
                Some(i) => t = tet.n[i],
                None => return Some(t),
            }
        }

        // Walks terminate on Delaunay triangulations; scan as a last resort.
        self.tets
            .iter()
            .enumerate()
            .filter(|(_, tet)| tet.alive)
            .find(|&(t, tet)| match tet.infinite_slot() {
                Some(k) => self.orient_at(t, k, p) > 0.0,
                None => (0..4).all(|i| self.orient_at(t, i, p) >= 0.0),
            })
            .map(|(t, _)| t)
    }

    /// Insert point `p`. Returns `false` if it coincides with an existing vertex.
    fn insert<R: Rng>(&mut self, p: usize, rng: &mut R) -> bool {
        let Some(start) = self.locate(p, rng) else {
            return false;
        };
        // Anything inside a finite tetrahedron other than its corners lies
        // strictly inside the circumsphere.
        if !self.in_conflict(start, p) {
            return false;
        }

        self.stamp += 1;
        let stamp = self.stamp;
        let mut cavity = vec![start];
        self.mark[start] = stamp;
        let mut k = 0;
        while k < cavity.len() {
            let t = cavity[k];
            k += 1;
            for i in 0..4 {
                let n = self.tets[t].n[i];
                if self.mark[n] != stamp && self.in_conflict(n, p) {
                    self.mark[n] = stamp;
                    cavity.push(n);
                }
            }
        }

        // Cone every boundary face of the cavity to p. The new tetrahedron
        // keeps the local indices of the cavity tetrahedron it replaces.
        let mut open_faces = HashMap::new();
        for &t in &cavity {
            for i in 0..4 {
                let outside = self.tets[t].n[i];
                if self.mark[outside] == stamp {
                    continue;
                }

                let mut v = self.tets[t].v;
                v[i] = p;
                let mut n = [NONE; 4];
                n[i] = outside;
                let new = self.push(Tet { v, n, alive: true });

                if let Some(j) = self.tets[outside].n.iter().position(|&x| x == t) {
                    self.tets[outside].n[j] = new;
                }
                self.link_faces(&mut open_faces, new, i);
                if !v.contains(&INFINITE) {
                    self.last = new;
                }
            }
        }

        for &t in &cavity {
            self.tets[t].alive = false;
        }
        true
    }

    /// Tetrahedra not touching the vertex at infinity, right-handed.
    fn finite_cells(&self) -> Vec<[usize; 4]> {
        self.tets
            .iter()
            .filter(|tet| tet.alive && tet.infinite_slot().is_none())
            .map(|tet| [tet.v[0], tet.v[1], tet.v[3], tet.v[2]])
            .collect()
    }
}

/// Sorted vertices of the face of `v` opposite local vertex `j`.
fn face_key(v: [usize; 4], j: usize) -> [usize; 3] {
    let mut key = [0; 3];
    let mut k = 0;
    for (m, &x) in v.iter().enumerate() {
        if m != j {
            key[k] = x;
            k += 1;
        }
    }
    key.sort_unstable();
    key
}

fn coord(p: &Point3<f64>) -> Coord3D<f64> {
    Coord3D {
        x: p.x,
        y: p.y,
        z: p.z,
    }
}

fn coincide(a: Coord3D<f64>, b: Coord3D<f64>) -> bool {
    a.x == b.x && a.y == b.y && a.z == b.z
}

/// Exact collinearity: three points are collinear iff all three axis-plane
/// projections are.
fn collinear(a: Coord3D<f64>, b: Coord3D<f64>, c: Coord3D<f64>) -> bool {
    let xy = |p: Coord3D<f64>| Coord { x: p.x, y: p.y };
    let yz = |p: Coord3D<f64>| Coord { x: p.y, y: p.z };
    let zx = |p: Coord3D<f64>| Coord { x: p.z, y: p.x };
    robust::orient2d(xy(a), xy(b), xy(c)) == 0.0
        && robust::orient2d(yz(a), yz(b), yz(c)) == 0.0
        && robust::orient2d(zx(a), zx(b), zx(c)) == 0.0
}

/// Run `service` on `points` and read back its cells, one row per tetrahedron.
pub fn tetrahedralize_with<D: DelaunayService>(
    service: &mut D,
    points: &[Point3<f64>],
) -> Result<DMatrix<usize>> {
    service.set_vertices(points)?;
    let cells: Vec<[usize; 4]> = (0..service.nb_cells())
        .map(|c| [0, 1, 2, 3].map(|lv| service.cell_vertex(c, lv)))
        .collect();
    Ok(tets_to_matrix(&cells))
}

/// Delaunay tetrahedralization of a point slice. One row per tetrahedron.
pub fn tetrahedralize_points(points: &[Point3<f64>]) -> Result<DMatrix<usize>> {
    tetrahedralize_with(&mut IncrementalDelaunay::new(), points)
}

/// Delaunay tetrahedralization of an `N x 3` coordinate matrix.
pub fn tetrahedralize(vertices: &DMatrix<f64>) -> Result<DMatrix<usize>> {
    if vertices.ncols() != 3 {
        return Err(MeshError::DimensionMismatch {
            expected: "3",
            found: vertices.ncols(),
        });
    }
    let points: Vec<Point3<f64>> = vertices
        .row_iter()
        .map(|r| Point3::new(r[0], r[1], r[2]))
        .collect();
    tetrahedralize_points(&points)
}
