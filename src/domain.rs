//! Synthetic sampling domains.
//!
//! Volumetric sampling runs over an ambient tetrahedral domain that encloses
//! the input. Two generators are provided:
//!
//! - [`box_mesh`]: the padded bounding box, tessellated from a fixed
//!   nine-vertex, twelve-tetrahedron unit-cube template (the default domain)
//! - [`sphere_mesh`]: a latitude/longitude sphere coned to its center
//!
//! Both templates are static tables or closed-form grids so that the
//! generated domains are bit-reproducible.

use std::f64::consts::PI;

use nalgebra::{DMatrix, Point3, Vector3};

use crate::error::{MeshError, Result};
use crate::mesh::{to_kernel_mesh_with_cells, ArrayMesh, KernelMesh, MeshIndex};

/// Corners of the unit cube, in the order shared by the box template and
/// the locked corners appended by the volume sampler.
pub const UNIT_CUBE_CORNERS: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0],
    [0.0, 1.0, 1.0],
    [1.0, 0.0, 0.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 0.0],
    [1.0, 1.0, 1.0],
];

/// Unit-cube template vertices: the eight corners plus one interior vertex.
///
/// The interior vertex sits off-center so that no template tetrahedron is flat.
pub const BOX_TEMPLATE_VERTICES: [[f64; 3]; 9] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0],
    [0.0, 1.0, 1.0],
    [1.0, 0.0, 0.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 0.0],
    [1.0, 1.0, 1.0],
    [0.494941, 0.652018, 0.319279],
];

/// Unit-cube template tetrahedra: each cube face split in two and coned to
/// the interior vertex.
pub const BOX_TEMPLATE_TETS: [[usize; 4]; 12] = [
    [0, 2, 3, 8],
    [6, 3, 8, 7],
    [1, 8, 3, 7],
    [1, 8, 5, 0],
    [8, 1, 5, 7],
    [1, 8, 0, 3],
    [5, 8, 4, 0],
    [5, 6, 8, 7],
    [5, 6, 4, 8],
    [4, 2, 0, 8],
    [6, 3, 2, 8],
    [2, 4, 6, 8],
];

/// Map a unit-cube coordinate into `[pmin - padding, pmax + padding]`.
fn lerp_padded(unit: &[f64; 3], pmin: &Point3<f64>, pmax: &Point3<f64>, padding: f64) -> Point3<f64> {
    Point3::from(Vector3::from_fn(|i, _| {
        unit[i] * (pmax[i] + padding) + (1.0 - unit[i]) * (pmin[i] - padding)
    }))
}

fn check_padding(padding: f64) -> Result<()> {
    if padding.is_finite() && padding >= 0.0 {
        Ok(())
    } else {
        Err(MeshError::invalid_param(
            "padding",
            padding,
            "must be finite and non-negative",
        ))
    }
}

/// The eight corners of the padded box, in [`UNIT_CUBE_CORNERS`] order.
pub fn box_corners(pmin: &Point3<f64>, pmax: &Point3<f64>, padding: f64) -> [Point3<f64>; 8] {
    UNIT_CUBE_CORNERS.map(|unit| lerp_padded(&unit, pmin, pmax, padding))
}

/// Array form of the padded box domain: 9 vertices, no faces, 12 tetrahedra.
pub fn box_arrays(pmin: &Point3<f64>, pmax: &Point3<f64>, padding: f64) -> Result<ArrayMesh> {
    check_padding(padding)?;

    let vertices = DMatrix::from_fn(BOX_TEMPLATE_VERTICES.len(), 3, |r, c| {
        lerp_padded(&BOX_TEMPLATE_VERTICES[r], pmin, pmax, padding)[c]
    });
    let cells = DMatrix::from_fn(BOX_TEMPLATE_TETS.len(), 4, |r, c| BOX_TEMPLATE_TETS[r][c]);

    Ok(ArrayMesh::with_cells(
        vertices,
        DMatrix::from_element(0, 3, 0),
        cells,
    ))
}

/// Tetrahedralized box spanning `[pmin - padding, pmax + padding]` per axis.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use tetsample::domain::box_mesh;
/// use tetsample::mesh::KernelMesh;
///
/// let mesh: KernelMesh = box_mesh(
///     &Point3::new(0.0, 0.0, 0.0),
///     &Point3::new(1.0, 2.0, 3.0),
///     0.5,
/// )
/// .unwrap();
/// assert_eq!(mesh.vertices.nb(), 9);
/// assert_eq!(mesh.cells.nb(), 12);
/// ```
pub fn box_mesh<I: MeshIndex>(
    pmin: &Point3<f64>,
    pmax: &Point3<f64>,
    padding: f64,
) -> Result<KernelMesh<I>> {
    let arrays = box_arrays(pmin, pmax, padding)?;
    to_kernel_mesh_with_cells(&arrays.vertices, &arrays.faces, &arrays.cells)
}

/// Array form of the latitude/longitude sphere domain.
///
/// Produces `resolution² + 1` vertices (a pole-to-pole grid followed by the
/// center), `2 (resolution - 1) resolution` surface triangles, and one
/// tetrahedron per triangle connecting it to the center.
///
/// Longitude wraps modulo `resolution`, so both poles and the seam carry
/// coincident vertices. They are kept as-is.
pub fn sphere_arrays(center: &Point3<f64>, radius: f64, resolution: usize) -> Result<ArrayMesh> {
    if resolution < 3 {
        return Err(MeshError::invalid_param(
            "resolution",
            resolution,
            "must be at least 3",
        ));
    }
    if !(radius.is_finite() && radius > 0.0) {
        return Err(MeshError::invalid_param(
            "radius",
            radius,
            "must be finite and positive",
        ));
    }

    let res = resolution;
    let step = (res - 1) as f64;
    let num_vertices = res * res + 1;

    let mut vertices = DMatrix::zeros(num_vertices, 3);
    for j in 0..res {
        let theta = PI * j as f64 / step;
        let z = center.z + radius * theta.cos();
        for k in 0..res {
            let phi = 2.0 * PI * k as f64 / step;
            let row = j * res + k;
            vertices[(row, 0)] = center.x + radius * theta.sin() * phi.cos();
            vertices[(row, 1)] = center.y + radius * theta.sin() * phi.sin();
            vertices[(row, 2)] = z;
        }
    }
    for c in 0..3 {
        vertices[(num_vertices - 1, c)] = center[c];
    }

    let num_faces = 2 * (res - 1) * res;
    let mut faces = DMatrix::from_element(num_faces, 3, 0usize);
    for j in 0..res - 1 {
        for k in 0..res {
            let v1 = j * res + k;
            let v2 = (j + 1) * res + k;
            let v3 = (j + 1) * res + (k + 1) % res;
            let v4 = j * res + (k + 1) % res;
            let f = 2 * (res * j + k);
            for (c, v) in [v1, v2, v3].into_iter().enumerate() {
                faces[(f, c)] = v;
            }
            for (c, v) in [v4, v1, v3].into_iter().enumerate() {
                faces[(f + 1, c)] = v;
            }
        }
    }

    let cells = DMatrix::from_fn(num_faces, 4, |r, c| {
        if c == 0 {
            num_vertices - 1
        } else {
            faces[(r, c - 1)]
        }
    });

    Ok(ArrayMesh::with_cells(vertices, faces, cells))
}

/// Tessellated sphere domain coned to its center. See [`sphere_arrays`].
pub fn sphere_mesh<I: MeshIndex>(
    center: &Point3<f64>,
    radius: f64,
    resolution: usize,
) -> Result<KernelMesh<I>> {
    sphere_arrays(center, radius, resolution)?.into_kernel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{CellId, VertexId};

    #[test]
    fn test_box_corners_are_padded_extremes() {
        let pmin = Point3::new(-1.0, 0.0, 2.0);
        let pmax = Point3::new(1.0, 3.0, 5.0);
        let corners = box_corners(&pmin, &pmax, 0.25);

        for (corner, unit) in corners.iter().zip(UNIT_CUBE_CORNERS.iter()) {
            for i in 0..3 {
                let expected = if unit[i] == 1.0 {
                    pmax[i] + 0.25
                } else {
                    pmin[i] - 0.25
                };
                assert_eq!(corner[i], expected);
            }
        }
    }

    #[test]
    fn test_box_mesh_fills_padded_box() {
        let pmin = Point3::new(0.0, 0.0, 0.0);
        let pmax = Point3::new(2.0, 1.0, 1.0);
        let mesh: KernelMesh = box_mesh(&pmin, &pmax, 0.5).unwrap();

        assert_eq!(mesh.vertices.nb(), 9);
        assert_eq!(mesh.facets.nb(), 0);
        assert_eq!(mesh.cells.nb(), 12);
        assert!(mesh.cells.are_simplices());

        let volume: f64 = mesh.cells.ids().filter_map(|c| mesh.tet_volume(c)).sum();
        let expected = 3.0 * 2.0 * 2.0;
        assert!((volume - expected).abs() < 1e-9);

        for c in mesh.cells.ids() {
            assert!(mesh.tet_volume(c).unwrap_or(0.0) > 1e-6);
        }

        let (bmin, bmax) = mesh.bbox().unwrap();
        assert_eq!(bmin, Point3::new(-0.5, -0.5, -0.5));
        assert_eq!(bmax, Point3::new(2.5, 1.5, 1.5));
    }

    #[test]
    fn test_box_mesh_cells_connected() {
        let mesh: KernelMesh = box_mesh(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 1.0, 1.0),
            0.0,
        )
        .unwrap();

        // Every tet touches the interior vertex, so it has exactly one
        // boundary face (on the cube) and three interior neighbours.
        for c in mesh.cells.ids() {
            let linked = (0..4)
                .filter(|&lf| mesh.cells.adjacent(c, lf).is_valid())
                .count();
            assert_eq!(linked, 3, "cell {:?}", c);
        }
        assert_eq!(mesh.cells.vertex(CellId::new(0), 3), VertexId::new(8));
    }

    #[test]
    fn test_box_rejects_negative_padding() {
        let p = Point3::new(0.0, 0.0, 0.0);
        assert!(matches!(
            box_mesh::<u32>(&p, &p, -1.0),
            Err(MeshError::InvalidParameter { name: "padding", .. })
        ));
    }

    #[test]
    fn test_sphere_counts_and_radius() {
        let center = Point3::new(1.0, -2.0, 0.5);
        let res = 8;
        let arrays = sphere_arrays(&center, 2.0, res).unwrap();

        assert_eq!(arrays.vertices.nrows(), res * res + 1);
        assert_eq!(arrays.faces.nrows(), 2 * (res - 1) * res);
        assert_eq!(arrays.cells.nrows(), arrays.faces.nrows());

        let points = arrays.points().unwrap();
        let (surface, last) = points.split_at(points.len() - 1);
        assert_eq!(last[0], center);
        for p in surface {
            assert!(((p - center).norm() - 2.0).abs() < 1e-12);
        }

        for r in 0..arrays.cells.nrows() {
            assert_eq!(arrays.cells[(r, 0)], res * res);
            for c in 0..3 {
                assert_eq!(arrays.cells[(r, c + 1)], arrays.faces[(r, c)]);
            }
        }
    }

    #[test]
    fn test_sphere_mesh_keeps_pole_duplicates() {
        let mesh: KernelMesh = sphere_mesh(&Point3::origin(), 1.0, 5).unwrap();

        // The whole first row collapses onto the north pole.
        let north = *mesh.vertices.point(VertexId::new(0));
        for k in 1..5 {
            let p = mesh.vertices.point(VertexId::new(k));
            assert!((p - north).norm() < 1e-12);
        }
        assert_eq!(mesh.cells.nb(), 2 * 4 * 5);
    }

    #[test]
    fn test_sphere_rejects_low_resolution() {
        assert!(sphere_arrays(&Point3::origin(), 1.0, 2).is_err());
        assert!(sphere_arrays(&Point3::origin(), 0.0, 8).is_err());
    }
}
