//! Sampling and tetrahedralization algorithms.
//!
//! - **Relaxation**: centroidal Voronoi relaxation with locked sites ([`cvt`])
//! - **Sampling**: constrained volume sampling and surface resampling ([`sample`])
//! - **Delaunay**: randomized incremental 3D Delaunay tetrahedralization ([`delaunay`])
//!
//! Long-running phases report through [`Progress`] and stop early when their
//! [`CancelToken`] is cancelled.

pub mod cvt;
pub mod delaunay;
mod progress;
pub mod sample;

pub use cvt::{CentroidalVoronoi, CvtOptions, RelaxationService};
pub use delaunay::{
    tetrahedralize, tetrahedralize_points, tetrahedralize_with, DelaunayService,
    IncrementalDelaunay,
};
pub use progress::{CancelToken, Progress, RelaxOutcome, RoundControl};
pub use sample::{
    relax_with_locked, resample_surface, resample_surface_with_control, sample_points,
    sample_volume, sample_volume_with_control, SamplingControl, SurfaceSampleOptions,
    SurfaceSamples, VolumeSampleOptions, VolumeSamples,
};
