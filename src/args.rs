//! Pipeline configuration.
//!
//! [`Args`] carries the settings of the whole tetrahedral meshing pipeline.
//! Only the sampling-related parts are consumed in this crate: the
//! [`Args::progress`] adapter, the cancellation token and the sampling
//! option helpers.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use tetsample::args::{Args, Step};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let args = Args::default().with_callback(move |step, fraction| {
//!     sink.lock().unwrap().push((step, fraction));
//! });
//!
//! args.progress(Step::Preprocess).report(1, 4, "Lloyd");
//! assert_eq!(seen.lock().unwrap()[0], (Step::Preprocess, 0.25));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::algo::{CancelToken, Progress, SamplingControl, VolumeSampleOptions};

/// Callback invoked with the current pipeline step and a loose completion
/// fraction in `[0, 1]`.
pub type StepCallback = Arc<dyn Fn(Step, f64) + Send + Sync>;

/// Stages of the meshing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
pub enum Step {
    /// Surface preprocessing (simplification).
    Preprocess = 0,
    /// Delaunay tetrahedralization.
    Delaunay = 1,
    /// Face matching.
    FaceMatching = 2,
    /// BSP subdivision.
    BSP = 3,
    /// Initial tetrahedralization.
    Tetra = 4,
    /// Mesh optimization.
    Optimize = 10,
}

impl Step {
    /// Numeric code of the step.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Preprocess => "preprocess",
            Step::Delaunay => "delaunay",
            Step::FaceMatching => "face matching",
            Step::BSP => "bsp",
            Step::Tetra => "tetra",
            Step::Optimize => "optimize",
        };
        f.write_str(name)
    }
}

/// Settings of the tetrahedral meshing pipeline.
///
/// Lengths ending in `_rel` are percentages of the input bounding box
/// diagonal.
#[derive(Clone)]
pub struct Args {
    /// Initial target edge length.
    ///
    /// Default: 5.0
    pub initial_edge_len_rel: f64,

    /// Target envelope epsilon.
    ///
    /// Default: 0.1
    pub eps_rel: f64,

    /// Explicit sampling distance for triangles, if any.
    ///
    /// Default: None
    pub sampling_dist_rel: Option<f64>,

    /// Pipeline stage. Retry with a higher stage if the previous one failed.
    ///
    /// Default: 1
    pub stage: u32,

    /// Multiplier for shrinking the target edge length around bad vertices.
    ///
    /// Default: 0.6
    pub adaptive_scalar: f64,

    /// Stop optimizing once the largest tet energy is below this.
    ///
    /// Default: 10.0
    pub filter_energy_thres: f64,

    /// Energy delta below which the sizing field is rescaled.
    ///
    /// Default: 0.1
    pub delta_energy_thres: f64,

    /// Maximum number of optimization passes.
    ///
    /// Default: 80
    pub max_num_passes: usize,

    /// Seed the initial Delaunay triangulation with voxel centers.
    ///
    /// Default: true
    pub use_voxel_stuffing: bool,

    /// Smooth faces covering open boundaries after optimization.
    ///
    /// Default: false
    pub smooth_open_boundary: bool,

    /// Minimum number of output vertices, if any.
    ///
    /// Default: None
    pub target_num_vertices: Option<usize>,

    /// Background mesh for the sizing field, if any.
    ///
    /// Default: None
    pub background_mesh: Option<String>,

    /// Simplify the input surface with mmgs.
    ///
    /// Default: false
    pub use_mmgs: bool,

    /// Optimize the final tet mesh with mmg3d.
    ///
    /// Default: false
    pub use_mmg3d: bool,

    /// Hand over to mmg3d as soon as possible.
    ///
    /// Default: true
    pub mmg3d_stop_early: bool,

    /// Minimum dihedral angle (degrees) required before handing over to
    /// mmg3d. Zero disables the check.
    ///
    /// Default: 0.0
    pub mmg3d_slivers_thres: f64,

    /// Sharp feature angle (degrees) for mmg. Zero disables detection.
    ///
    /// Default: 45.0
    pub mmg_angle_thres: f64,

    /// Write per-run statistics to a CSV file.
    ///
    /// Default: true
    pub write_csv_file: bool,

    /// Working directory for intermediate output.
    ///
    /// Default: ""
    pub working_dir: String,

    /// Suffix appended to output file names.
    ///
    /// Default: "_"
    pub postfix: String,

    /// CSV output path.
    ///
    /// Default: ""
    pub csv_file: String,

    /// Stage after which to save an intermediate result, if any.
    ///
    /// Default: None
    pub save_mid_result: Option<u32>,

    /// Suppress informational output.
    ///
    /// Default: false
    pub is_quiet: bool,

    /// Called between and during pipeline steps.
    ///
    /// Default: None
    pub user_callback: Option<StepCallback>,

    /// Cancels long-running phases when set.
    pub cancel: CancelToken,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            initial_edge_len_rel: 5.0,
            eps_rel: 0.1,
            sampling_dist_rel: None,
            stage: 1,
            adaptive_scalar: 0.6,
            filter_energy_thres: 10.0,
            delta_energy_thres: 0.1,
            max_num_passes: 80,
            use_voxel_stuffing: true,
            smooth_open_boundary: false,
            target_num_vertices: None,
            background_mesh: None,
            use_mmgs: false,
            use_mmg3d: false,
            mmg3d_stop_early: true,
            mmg3d_slivers_thres: 0.0,
            mmg_angle_thres: 45.0,
            write_csv_file: true,
            working_dir: String::new(),
            postfix: "_".to_string(),
            csv_file: String::new(),
            save_mid_result: None,
            is_quiet: false,
            user_callback: None,
            cancel: CancelToken::new(),
        }
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("initial_edge_len_rel", &self.initial_edge_len_rel)
            .field("eps_rel", &self.eps_rel)
            .field("sampling_dist_rel", &self.sampling_dist_rel)
            .field("stage", &self.stage)
            .field("max_num_passes", &self.max_num_passes)
            .field("target_num_vertices", &self.target_num_vertices)
            .field("is_quiet", &self.is_quiet)
            .field("user_callback", &self.user_callback.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Args {
    /// Set the step callback.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Step, f64) + Send + Sync + 'static,
    {
        self.user_callback = Some(Arc::new(callback));
        self
    }

    /// Set the cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Progress reporter that forwards to the step callback as `step` with
    /// the fraction of rounds completed.
    pub fn progress(&self, step: Step) -> Progress {
        match &self.user_callback {
            Some(callback) => {
                let callback = Arc::clone(callback);
                Progress::new(move |current, total, _| {
                    callback(step, current as f64 / total.max(1) as f64)
                })
            }
            None => Progress::none(),
        }
    }

    /// Sampling control wired to the step callback and the shared token.
    pub fn sampling_control(&self, step: Step) -> SamplingControl {
        SamplingControl::shared(self.cancel.clone()).with_progress(self.progress(step))
    }

    /// Volume sampling options: 10 Lloyd rounds, no Newton rounds.
    pub fn volume_sample_options(&self, num_samples: usize, padding: f64) -> VolumeSampleOptions {
        VolumeSampleOptions::new(num_samples, padding)
            .with_lloyd_rounds(10)
            .with_newton_rounds(0)
    }
}
