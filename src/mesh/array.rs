//! Conversion between array meshes and kernel meshes.
//!
//! An [`ArrayMesh`] is the flat representation used at API boundaries: an
//! `N×3` (or `N×2`) coordinate matrix plus index matrices whose column count
//! is the element arity. Conversion to a [`KernelMesh`] validates arity and
//! vertex references up front, so a failing conversion never yields a
//! partially built mesh.

use nalgebra::{DMatrix, Point3};

use super::index::{CellId, FacetId, MeshIndex, VertexId};
use super::kernel::KernelMesh;
use crate::error::{MeshError, Result};

/// A mesh stored as coordinate and index matrices.
///
/// Row `i` of `vertices` is the position of vertex `i`. Each row of `faces`
/// is a triangle (3 columns) or quad (4 columns); each row of `cells` is a
/// tetrahedron (4 columns).
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayMesh {
    /// Vertex coordinates, one row per vertex.
    pub vertices: DMatrix<f64>,
    /// Face vertex indices, one row per face.
    pub faces: DMatrix<usize>,
    /// Cell vertex indices, one row per cell.
    pub cells: DMatrix<usize>,
}

impl ArrayMesh {
    /// Create a surface mesh without cells.
    pub fn new(vertices: DMatrix<f64>, faces: DMatrix<usize>) -> Self {
        Self {
            vertices,
            faces,
            cells: DMatrix::from_element(0, 4, 0),
        }
    }

    /// Create a mesh with faces and cells.
    pub fn with_cells(vertices: DMatrix<f64>, faces: DMatrix<usize>, cells: DMatrix<usize>) -> Self {
        Self {
            vertices,
            faces,
            cells,
        }
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.nrows()
    }

    /// Convert into a kernel mesh, consuming the arrays.
    pub fn into_kernel<I: MeshIndex>(self) -> Result<KernelMesh<I>> {
        to_kernel_mesh_with_cells(&self.vertices, &self.faces, &self.cells)
    }

    /// Vertex positions as points (2D input gets `z = 0`).
    pub fn points(&self) -> Result<Vec<Point3<f64>>> {
        points_from_matrix(&self.vertices)
    }
}

/// Build a kernel mesh from vertices and faces.
///
/// Faces must be all triangles or all quads. Facet adjacency is derived
/// before returning.
pub fn to_kernel_mesh<I: MeshIndex>(
    vertices: &DMatrix<f64>,
    faces: &DMatrix<usize>,
) -> Result<KernelMesh<I>> {
    let points = points_from_matrix(vertices)?;
    check_capacity::<I>("vertex count", points.len())?;
    check_capacity::<I>("face count", faces.nrows())?;
    validate_faces(faces, points.len())?;

    let mut mesh = KernelMesh::new();
    fill_vertices(&mut mesh, &points);
    fill_facets(&mut mesh, faces);
    mesh.facets.connect();
    Ok(mesh)
}

/// Build a kernel mesh from vertices, faces and tetrahedral cells.
///
/// An empty cell matrix (zero rows) is accepted whatever its column count.
pub fn to_kernel_mesh_with_cells<I: MeshIndex>(
    vertices: &DMatrix<f64>,
    faces: &DMatrix<usize>,
    cells: &DMatrix<usize>,
) -> Result<KernelMesh<I>> {
    let points = points_from_matrix(vertices)?;
    check_capacity::<I>("vertex count", points.len())?;
    check_capacity::<I>("face count", faces.nrows())?;
    check_capacity::<I>("cell count", cells.nrows())?;
    validate_faces(faces, points.len())?;
    validate_cells(cells, points.len())?;

    let mut mesh = KernelMesh::new();
    fill_vertices(&mut mesh, &points);
    fill_facets(&mut mesh, faces);
    mesh.facets.connect();

    if cells.nrows() > 0 {
        let first = mesh.cells.create_tets(cells.nrows());
        for r in 0..cells.nrows() {
            let c = CellId::new(first.index() + r);
            for lv in 0..4 {
                mesh.cells.set_vertex(c, lv, VertexId::new(cells[(r, lv)]));
            }
        }
    }
    mesh.cells.connect();

    log::debug!(
        "built kernel mesh: {} vertices, {} facets, {} cells",
        mesh.vertices.nb(),
        mesh.facets.nb(),
        mesh.cells.nb()
    );
    Ok(mesh)
}

/// Extract vertices, triangles and tetrahedra from a simplicial kernel mesh.
///
/// Fails with [`MeshError::NotSimplicial`] if any facet is not a triangle or
/// any cell is not a tetrahedron.
pub fn from_kernel_mesh<I: MeshIndex>(mesh: &KernelMesh<I>) -> Result<ArrayMesh> {
    if !mesh.facets.are_simplices() {
        return Err(MeshError::NotSimplicial { element: "facets" });
    }
    if !mesh.cells.are_simplices() {
        return Err(MeshError::NotSimplicial { element: "cells" });
    }

    let vertices = points_to_matrix(mesh.vertices.points());
    let faces = DMatrix::from_fn(mesh.facets.nb(), 3, |r, lv| {
        mesh.facets.vertex(FacetId::new(r), lv).index()
    });
    let cells = DMatrix::from_fn(mesh.cells.nb(), 4, |r, lv| {
        mesh.cells.vertex(CellId::new(r), lv).index()
    });

    Ok(ArrayMesh::with_cells(vertices, faces, cells))
}

/// Read an `N×2` or `N×3` coordinate matrix as points.
pub fn points_from_matrix(vertices: &DMatrix<f64>) -> Result<Vec<Point3<f64>>> {
    match vertices.ncols() {
        2 => Ok(vertices
            .row_iter()
            .map(|r| Point3::new(r[0], r[1], 0.0))
            .collect()),
        3 => Ok(vertices
            .row_iter()
            .map(|r| Point3::new(r[0], r[1], r[2]))
            .collect()),
        n => Err(MeshError::DimensionMismatch {
            expected: "2 or 3",
            found: n,
        }),
    }
}

/// Write points as an `N×3` coordinate matrix.
pub fn points_to_matrix(points: &[Point3<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(points.len(), 3, |r, c| points[r][c])
}

/// Write tetrahedra as an `N×4` index matrix.
pub fn tets_to_matrix(tets: &[[usize; 4]]) -> DMatrix<usize> {
    DMatrix::from_fn(tets.len(), 4, |r, c| tets[r][c])
}

/// Every element id must fit the index type `I`.
fn check_capacity<I: MeshIndex>(name: &'static str, count: usize) -> Result<()> {
    if count > I::MAX.to_usize() {
        return Err(MeshError::invalid_param(name, count, "exceeds the mesh index type"));
    }
    Ok(())
}

fn validate_faces(faces: &DMatrix<usize>, num_vertices: usize) -> Result<()> {
    if faces.nrows() == 0 {
        return Ok(());
    }
    match faces.ncols() {
        3 | 4 => validate_indices(faces, num_vertices, "face"),
        arity => Err(MeshError::UnsupportedFacetArity { arity }),
    }
}

fn validate_cells(cells: &DMatrix<usize>, num_vertices: usize) -> Result<()> {
    if cells.nrows() == 0 {
        return Ok(());
    }
    match cells.ncols() {
        4 => validate_indices(cells, num_vertices, "cell"),
        arity => Err(MeshError::UnsupportedCellArity { arity }),
    }
}

fn validate_indices(
    elements: &DMatrix<usize>,
    num_vertices: usize,
    element: &'static str,
) -> Result<()> {
    for (index, row) in elements.row_iter().enumerate() {
        if let Some(&vertex) = row.iter().find(|&&v| v >= num_vertices) {
            return Err(MeshError::InvalidVertexIndex {
                element,
                index,
                vertex,
            });
        }
    }
    Ok(())
}

fn fill_vertices<I: MeshIndex>(mesh: &mut KernelMesh<I>, points: &[Point3<f64>]) {
    let first = mesh.vertices.create_vertices(points.len());
    for (i, p) in points.iter().enumerate() {
        mesh.vertices.set_point(VertexId::new(first.index() + i), *p);
    }
}

fn fill_facets<I: MeshIndex>(mesh: &mut KernelMesh<I>, faces: &DMatrix<usize>) {
    if faces.nrows() == 0 {
        return;
    }
    let arity = faces.ncols();
    let first = if arity == 3 {
        mesh.facets.create_triangles(faces.nrows())
    } else {
        mesh.facets.create_quads(faces.nrows())
    };
    for r in 0..faces.nrows() {
        let f = FacetId::new(first.index() + r);
        for lv in 0..arity {
            mesh.facets.set_vertex(f, lv, VertexId::new(faces[(r, lv)]));
        }
    }
}
