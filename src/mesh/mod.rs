//! Core mesh data structures.
//!
//! This module provides the two mesh representations the rest of the crate
//! moves between:
//!
//! - [`ArrayMesh`]: coordinate and index matrices, as exchanged with callers
//! - [`KernelMesh`]: an indexed mesh with vertex, facet and cell containers and
//!   derived adjacency, as consumed by the sampling algorithms
//!
//! # Index Types
//!
//! Kernel mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`FacetId`] - Identifies a facet (triangle or quad)
//! - [`CellId`] - Identifies a cell (tetrahedron, hexahedron, ...)
//!
//! These indices are generic over the underlying integer type ([`MeshIndex`] trait).
//!
//! # Conversion
//!
//! ```
//! use nalgebra::DMatrix;
//! use tetsample::mesh::{from_kernel_mesh, to_kernel_mesh_with_cells, KernelMesh};
//!
//! let vertices = DMatrix::from_row_slice(4, 3, &[
//!     0.0, 0.0, 0.0,
//!     1.0, 0.0, 0.0,
//!     0.0, 1.0, 0.0,
//!     0.0, 0.0, 1.0,
//! ]);
//! let faces = DMatrix::from_row_slice(1, 3, &[0, 2, 1]);
//! let cells = DMatrix::from_row_slice(1, 4, &[0, 1, 2, 3]);
//!
//! let mesh: KernelMesh = to_kernel_mesh_with_cells(&vertices, &faces, &cells).unwrap();
//! let arrays = from_kernel_mesh(&mesh).unwrap();
//! assert_eq!(arrays.vertices, vertices);
//! assert_eq!(arrays.cells, cells);
//! ```

mod array;
mod index;
mod kernel;

pub use array::{
    from_kernel_mesh, points_from_matrix, points_to_matrix, tets_to_matrix, to_kernel_mesh,
    to_kernel_mesh_with_cells, ArrayMesh,
};
pub use index::{CellId, FacetId, MeshIndex, VertexId};
pub use kernel::{bounding_box, CellType, Cells, Facets, KernelMesh, Vertices};
