//! # tetsample
//!
//! Mesh interchange and volumetric point sampling for tetrahedral mesh
//! generation.
//!
//! tetsample moves meshes between a flat array form and an indexed kernel
//! mesh, builds synthetic sampling domains, relaxes point clouds with
//! centroidal Voronoi iterations while keeping selected points locked, and
//! tetrahedralizes point sets with a robust Delaunay construction.
//!
//! ## Features
//!
//! - **Array adapter**: `N x 3` coordinates plus triangle/quad faces and
//!   tetrahedral cells, to and from [`mesh::KernelMesh`]
//! - **Flexible indexing**: Support for 16-bit, 32-bit, and 64-bit indices
//! - **Synthetic domains**: padded bounding boxes and lat/long spheres
//! - **Constrained sampling**: Lloyd and Newton relaxation with locked points
//! - **Exact predicates**: Delaunay insertion decided with `robust`
//!
//! ## Sampling a Volume
//!
//! ```
//! use nalgebra::DMatrix;
//! use tetsample::prelude::*;
//!
//! let vertices = DMatrix::from_row_slice(4, 3, &[
//!     0.0, 0.0, 0.0,
//!     1.0, 0.0, 0.0,
//!     0.0, 1.0, 0.0,
//!     0.0, 0.0, 1.0,
//! ]);
//!
//! // 24 free samples, box padded by 0.2, three Lloyd rounds.
//! let options = VolumeSampleOptions::new(24, 0.2).with_lloyd_rounds(3);
//! let samples = sample_volume(&vertices, &options).unwrap();
//! assert_eq!(samples.len(), 24 + 4 + 8);
//!
//! // The input vertices come back untouched.
//! assert_eq!(samples.input_vertices()[3].z, 1.0);
//!
//! // Tetrahedralize everything.
//! let tets = tetrahedralize(&samples.to_matrix()).unwrap();
//! assert!(tets.nrows() > 0);
//! ```
//!
//! ## Converting Meshes
//!
//! ```
//! use nalgebra::Point3;
//! use tetsample::prelude::*;
//!
//! let domain = box_arrays(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0), 0.0).unwrap();
//! let mesh: KernelMesh = domain.clone().into_kernel().unwrap();
//! assert_eq!(mesh.cells.nb(), 12);
//! assert!(mesh.cells.are_simplices());
//!
//! let back = from_kernel_mesh(&mesh).unwrap();
//! assert_eq!(back.vertices, domain.vertices);
//! assert_eq!(back.cells, domain.cells);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod args;
pub mod domain;
pub mod error;
pub mod mesh;

pub use nalgebra;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use tetsample::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::{
        resample_surface, sample_volume, tetrahedralize, tetrahedralize_points, CancelToken,
        Progress, SamplingControl, SurfaceSampleOptions, VolumeSampleOptions, VolumeSamples,
    };
    pub use crate::args::{Args, Step};
    pub use crate::domain::{box_arrays, box_mesh, sphere_arrays, sphere_mesh};
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        from_kernel_mesh, to_kernel_mesh, to_kernel_mesh_with_cells, ArrayMesh, CellId, FacetId,
        KernelMesh, MeshIndex, VertexId,
    };
}
