//! Uniform random integration points over a tetrahedral volume or a
//! triangulated surface, and projection back onto that surface.

use nalgebra::Point3;
use rand::Rng;

use crate::error::{MeshError, Result};
use crate::mesh::{KernelMesh, MeshIndex};

/// Area- or volume-weighted sampler over the simplices of a domain.
pub(crate) struct DomainSampler {
    triangles: Vec<[Point3<f64>; 3]>,
    tets: Vec<[Point3<f64>; 4]>,
    cumulative: Vec<f64>,
    total: f64,
}

impl DomainSampler {
    /// Sampler over the tetrahedra of `mesh`.
    pub(crate) fn volume<I: MeshIndex>(mesh: &KernelMesh<I>) -> Result<Self> {
        if mesh.cells.nb() == 0 {
            return Err(MeshError::EmptyMesh);
        }
        if !mesh.cells.are_simplices() {
            return Err(MeshError::NotSimplicial { element: "cells" });
        }

        let tets: Vec<[Point3<f64>; 4]> = mesh.cells.ids().map(|c| mesh.tet_points(c)).collect();
        let weights = tets
            .iter()
            .map(|[a, b, c, d]| ((b - a).cross(&(c - a)).dot(&(d - a)) / 6.0).abs())
            .collect();
        Self::build(Vec::new(), tets, weights)
    }

    /// Sampler over the facets of `mesh`, quads split into two triangles.
    pub(crate) fn surface<I: MeshIndex>(mesh: &KernelMesh<I>) -> Result<Self> {
        if mesh.facets.nb() == 0 {
            return Err(MeshError::EmptyMesh);
        }

        let triangles: Vec<[Point3<f64>; 3]> = mesh
            .facets
            .ids()
            .flat_map(|f| mesh.facet_triangles(f))
            .map(|[a, b, c]| {
                [
                    *mesh.vertices.point(a),
                    *mesh.vertices.point(b),
                    *mesh.vertices.point(c),
                ]
            })
            .collect();
        let weights = triangles
            .iter()
            .map(|[a, b, c]| (b - a).cross(&(c - a)).norm() * 0.5)
            .collect();
        Self::build(triangles, Vec::new(), weights)
    }

    fn build(
        triangles: Vec<[Point3<f64>; 3]>,
        tets: Vec<[Point3<f64>; 4]>,
        weights: Vec<f64>,
    ) -> Result<Self> {
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        for w in weights {
            total += w;
            cumulative.push(total);
        }
        if !(total > 0.0 && total.is_finite()) {
            return Err(MeshError::invalid_param(
                "domain measure",
                total,
                "must be positive and finite",
            ));
        }
        Ok(Self {
            triangles,
            tets,
            cumulative,
            total,
        })
    }

    /// Total area or volume.
    pub(crate) fn measure(&self) -> f64 {
        self.total
    }

    /// Whether the domain is a surface (and sites must be projected onto it).
    pub(crate) fn is_surface(&self) -> bool {
        !self.triangles.is_empty()
    }

    /// Draw one uniformly distributed point.
    pub(crate) fn sample<R: Rng>(&self, rng: &mut R) -> Point3<f64> {
        let u = rng.gen::<f64>() * self.total;
        let i = self
            .cumulative
            .partition_point(|&c| c <= u)
            .min(self.cumulative.len() - 1);

        // Normalized exponentials give uniform barycentric coordinates.
        let mut weight = || -(1.0 - rng.gen::<f64>()).ln();
        if let Some(tri) = self.triangles.get(i) {
            let b = [weight(), weight(), weight()];
            let sum: f64 = b.iter().sum();
            Point3::from((tri[0].coords * b[0] + tri[1].coords * b[1] + tri[2].coords * b[2]) / sum)
        } else {
            let tet = &self.tets[i];
            let b = [weight(), weight(), weight(), weight()];
            let sum: f64 = b.iter().sum();
            Point3::from(
                (tet[0].coords * b[0]
                    + tet[1].coords * b[1]
                    + tet[2].coords * b[2]
                    + tet[3].coords * b[3])
                    / sum,
            )
        }
    }

    /// Closest point of the surface to `p`. Volume domains return `p`.
    pub(crate) fn project(&self, p: &Point3<f64>) -> Point3<f64> {
        let mut best = *p;
        let mut best_d2 = f64::INFINITY;
        for [a, b, c] in &self.triangles {
            let q = closest_point_on_triangle(p, a, b, c);
            let d2 = (q - p).norm_squared();
            if d2 < best_d2 {
                best_d2 = d2;
                best = q;
            }
        }
        best
    }
}

/// Closest point on triangle `abc` to `p`, resolved by Voronoi region.
pub(crate) fn closest_point_on_triangle(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Point3<f64> {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return closest_point_on_segment(p, a, b);
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return closest_point_on_segment(p, a, c);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return closest_point_on_segment(p, b, c);
    }

    let denom = va + vb + vc;
    if denom.abs() < 1e-300 {
        // Degenerate triangle.
        return closest_point_on_segment(p, a, b);
    }
    let v = vb / denom;
    let w = vc / denom;
    a + ab * v + ac * w
}

/// Closest point on segment `ab` to `p`.
pub(crate) fn closest_point_on_segment(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
) -> Point3<f64> {
    let ab = b - a;
    let len2 = ab.norm_squared();

    if len2 < 1e-24 {
        return *a;
    }

    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}
