//! Constrained volumetric sampling and surface resampling.
//!
//! [`sample_volume`] fills the padded bounding box of a point set with a
//! near-uniform cloud of free samples. The input points and the eight box
//! corners are appended as locked sites, so relaxation never moves them and
//! the free samples settle around them.
//!
//! [`resample_surface`] runs the same relaxation on the triangles (or quads)
//! of a surface, with every sample free.
//!
//! # Output layout
//!
//! Volume sampling returns `num_samples + |V| + 8` points in creation order:
//! free samples, then the input vertices, then the box corners.
//! [`VolumeSamples`] exposes each block by name.
//!
//! ```
//! use nalgebra::DMatrix;
//! use tetsample::algo::{sample_volume, VolumeSampleOptions};
//!
//! let vertices = DMatrix::from_row_slice(4, 3, &[
//!     0.0, 0.0, 0.0,
//!     1.0, 0.0, 0.0,
//!     0.0, 1.0, 0.0,
//!     0.0, 0.0, 1.0,
//! ]);
//! let options = VolumeSampleOptions::new(16, 0.1).with_lloyd_rounds(2);
//! let samples = sample_volume(&vertices, &options).unwrap();
//!
//! assert_eq!(samples.len(), 16 + 4 + 8);
//! assert_eq!(samples.free_samples().len(), 16);
//! assert_eq!(samples.input_vertices()[1].x, 1.0);
//! assert_eq!(samples.box_corners()[0].x, -0.1);
//! ```

use nalgebra::{DMatrix, Point3};

use crate::domain::{box_corners, box_mesh};
use crate::error::{MeshError, Result};
use crate::mesh::{bounding_box, points_from_matrix, points_to_matrix, to_kernel_mesh, KernelMesh};

use super::cvt::{CentroidalVoronoi, CvtOptions, RelaxationService};
use super::progress::{CancelToken, Progress, RelaxOutcome, RoundControl};

/// Options for [`sample_volume`].
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSampleOptions {
    /// Number of free samples. Must be greater than 3.
    ///
    /// Default: 1000
    pub num_samples: usize,

    /// Distance the sampling box extends past the input bounding box on
    /// every side.
    ///
    /// Default: 0.0
    pub padding: f64,

    /// Lloyd rounds. Zero skips the phase.
    ///
    /// Default: 10
    pub lloyd_rounds: usize,

    /// Newton rounds, run after the Lloyd phase. Zero skips the phase.
    ///
    /// Default: 0
    pub newton_rounds: usize,

    /// Seed for initial placement and integration.
    ///
    /// Default: 0
    pub seed: u64,
}

impl Default for VolumeSampleOptions {
    fn default() -> Self {
        Self {
            num_samples: 1000,
            padding: 0.0,
            lloyd_rounds: 10,
            newton_rounds: 0,
            seed: 0,
        }
    }
}

impl VolumeSampleOptions {
    /// Options for `num_samples` free samples in a box padded by `padding`.
    pub fn new(num_samples: usize, padding: f64) -> Self {
        Self {
            num_samples,
            padding,
            ..Self::default()
        }
    }

    /// Set the number of Lloyd rounds.
    pub fn with_lloyd_rounds(mut self, rounds: usize) -> Self {
        self.lloyd_rounds = rounds;
        self
    }

    /// Set the number of Newton rounds.
    pub fn with_newton_rounds(mut self, rounds: usize) -> Self {
        self.newton_rounds = rounds;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Options for [`resample_surface`].
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSampleOptions {
    /// Number of samples. Must be greater than 3.
    ///
    /// Default: 1000
    pub num_samples: usize,

    /// Lloyd rounds. Zero skips the phase.
    ///
    /// Default: 10
    pub lloyd_rounds: usize,

    /// Newton rounds. Zero skips the phase.
    ///
    /// Default: 0
    pub newton_rounds: usize,

    /// Seed for initial placement and integration.
    ///
    /// Default: 0
    pub seed: u64,
}

impl Default for SurfaceSampleOptions {
    fn default() -> Self {
        Self {
            num_samples: 1000,
            lloyd_rounds: 10,
            newton_rounds: 0,
            seed: 0,
        }
    }
}

impl SurfaceSampleOptions {
    /// Options for `num_samples` surface samples.
    pub fn new(num_samples: usize) -> Self {
        Self {
            num_samples,
            ..Self::default()
        }
    }

    /// Set the number of Lloyd rounds.
    pub fn with_lloyd_rounds(mut self, rounds: usize) -> Self {
        self.lloyd_rounds = rounds;
        self
    }

    /// Set the number of Newton rounds.
    pub fn with_newton_rounds(mut self, rounds: usize) -> Self {
        self.newton_rounds = rounds;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Progress reporting and per-phase cancellation for a sampling run.
#[derive(Debug, Default)]
pub struct SamplingControl {
    /// Receives one report per relaxation round, labelled by phase.
    pub progress: Progress,
    /// Polled before every Lloyd round.
    pub lloyd_cancel: CancelToken,
    /// Polled before every Newton round.
    pub newton_cancel: CancelToken,
}

impl SamplingControl {
    /// One token for both phases.
    pub fn shared(token: CancelToken) -> Self {
        Self {
            progress: Progress::none(),
            lloyd_cancel: token.clone(),
            newton_cancel: token,
        }
    }

    /// Set the progress reporter.
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    fn lloyd(&self) -> RoundControl<'_> {
        RoundControl::new(&self.progress, &self.lloyd_cancel)
    }

    fn newton(&self) -> RoundControl<'_> {
        RoundControl::new(&self.progress, &self.newton_cancel)
    }
}

/// Result of [`sample_volume`].
#[derive(Debug, Clone)]
pub struct VolumeSamples {
    points: Vec<Point3<f64>>,
    num_free: usize,
    num_input: usize,
    /// How the Lloyd phase ended.
    pub lloyd: RelaxOutcome,
    /// How the Newton phase ended.
    pub newton: RelaxOutcome,
}

impl VolumeSamples {
    /// Total number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether there are no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The relaxed free samples.
    pub fn free_samples(&self) -> &[Point3<f64>] {
        &self.points[..self.num_free]
    }

    /// The input vertices, unchanged and in input order.
    pub fn input_vertices(&self) -> &[Point3<f64>] {
        &self.points[self.num_free..self.num_free + self.num_input]
    }

    /// The eight padded box corners.
    pub fn box_corners(&self) -> &[Point3<f64>] {
        &self.points[self.num_free + self.num_input..]
    }

    /// All points in creation order.
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Take all points in creation order.
    pub fn into_points(self) -> Vec<Point3<f64>> {
        self.points
    }

    /// All points as an `N x 3` matrix.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        points_to_matrix(&self.points)
    }
}

/// Result of [`resample_surface`].
#[derive(Debug, Clone)]
pub struct SurfaceSamples {
    points: Vec<Point3<f64>>,
    /// How the Lloyd phase ended.
    pub lloyd: RelaxOutcome,
    /// How the Newton phase ended.
    pub newton: RelaxOutcome,
}

impl SurfaceSamples {
    /// The samples.
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Take the samples.
    pub fn into_points(self) -> Vec<Point3<f64>> {
        self.points
    }

    /// The samples as an `N x 3` matrix.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        points_to_matrix(&self.points)
    }
}

fn check_sample_count(num_samples: usize) -> Result<()> {
    if num_samples > 3 {
        Ok(())
    } else {
        Err(MeshError::invalid_param(
            "num_samples",
            num_samples,
            "must be greater than 3",
        ))
    }
}

/// Seed `num_samples` free sites, append `locked` as pinned sites, then run
/// the Lloyd phase followed by the Newton phase.
///
/// Works with any [`RelaxationService`]. Each phase is skipped when its round
/// count is zero and stops early when its token is cancelled.
pub fn relax_with_locked<S: RelaxationService>(
    service: &mut S,
    num_samples: usize,
    locked: &[Point3<f64>],
    lloyd_rounds: usize,
    newton_rounds: usize,
    control: &SamplingControl,
) -> Result<(RelaxOutcome, RelaxOutcome)> {
    service.compute_initial_sampling(num_samples)?;
    service.resize_points(num_samples + locked.len());
    for (k, p) in locked.iter().enumerate() {
        service.set_point(num_samples + k, *p);
        service.lock_point(num_samples + k);
    }

    let lloyd = if lloyd_rounds > 0 {
        log::info!("Lloyd relaxation: {} rounds", lloyd_rounds);
        service.lloyd_iterations(lloyd_rounds, control.lloyd())
    } else {
        RelaxOutcome::skipped()
    };

    let newton = if newton_rounds > 0 {
        log::info!("Newton relaxation: {} rounds", newton_rounds);
        service.newton_iterations(newton_rounds, control.newton())
    } else {
        RelaxOutcome::skipped()
    };

    log::debug!(
        "relaxation done: Lloyd {}/{}, Newton {}/{}",
        lloyd.completed,
        lloyd.requested,
        newton.completed,
        newton.requested
    );
    Ok((lloyd, newton))
}

/// Sample the padded bounding box of `vertices` (`N x 2` or `N x 3`).
pub fn sample_volume(vertices: &DMatrix<f64>, options: &VolumeSampleOptions) -> Result<VolumeSamples> {
    sample_volume_with_control(vertices, options, &SamplingControl::default())
}

/// [`sample_volume`] with progress reporting and cancellation.
pub fn sample_volume_with_control(
    vertices: &DMatrix<f64>,
    options: &VolumeSampleOptions,
    control: &SamplingControl,
) -> Result<VolumeSamples> {
    check_sample_count(options.num_samples)?;
    let input = points_from_matrix(vertices)?;
    log::debug!("volume sampling input: {} vertices", input.len());
    sample_points(&input, options, control)
}

/// [`sample_volume_with_control`] over a point slice.
pub fn sample_points(
    input: &[Point3<f64>],
    options: &VolumeSampleOptions,
    control: &SamplingControl,
) -> Result<VolumeSamples> {
    check_sample_count(options.num_samples)?;
    let (pmin, pmax) = bounding_box(input).ok_or(MeshError::EmptyMesh)?;

    let domain: KernelMesh = box_mesh(&pmin, &pmax, options.padding)?;
    let corners = box_corners(&pmin, &pmax, options.padding);
    log::info!(
        "volume sampling: {} free samples, {} locked input vertices, padding {}",
        options.num_samples,
        input.len(),
        options.padding
    );

    let mut locked = Vec::with_capacity(input.len() + corners.len());
    locked.extend_from_slice(input);
    locked.extend_from_slice(&corners);

    let mut cvt = CentroidalVoronoi::new(&domain, true, CvtOptions::default().with_seed(options.seed))?;
    let (lloyd, newton) = relax_with_locked(
        &mut cvt,
        options.num_samples,
        &locked,
        options.lloyd_rounds,
        options.newton_rounds,
        control,
    )?;

    Ok(VolumeSamples {
        points: cvt.embedding().to_vec(),
        num_free: options.num_samples,
        num_input: input.len(),
        lloyd,
        newton,
    })
}

/// Resample the surface `(vertices, faces)` with all samples free.
pub fn resample_surface(
    vertices: &DMatrix<f64>,
    faces: &DMatrix<usize>,
    options: &SurfaceSampleOptions,
) -> Result<SurfaceSamples> {
    resample_surface_with_control(vertices, faces, options, &SamplingControl::default())
}

/// [`resample_surface`] with progress reporting and cancellation.
pub fn resample_surface_with_control(
    vertices: &DMatrix<f64>,
    faces: &DMatrix<usize>,
    options: &SurfaceSampleOptions,
    control: &SamplingControl,
) -> Result<SurfaceSamples> {
    check_sample_count(options.num_samples)?;
    let surface: KernelMesh = to_kernel_mesh(vertices, faces)?;
    log::info!(
        "surface resampling: {} samples over {} facets",
        options.num_samples,
        surface.facets.nb()
    );

    let mut cvt = CentroidalVoronoi::new(&surface, false, CvtOptions::default().with_seed(options.seed))?;
    let (lloyd, newton) = relax_with_locked(
        &mut cvt,
        options.num_samples,
        &[],
        options.lloyd_rounds,
        options.newton_rounds,
        control,
    )?;

    Ok(SurfaceSamples {
        points: cvt.embedding().to_vec(),
        lloyd,
        newton,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sphere_arrays;

    fn cube_vertices() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            8,
            3,
            &[
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, //
                1.0, 1.0, 0.0, //
                0.0, 0.0, 1.0, //
                1.0, 0.0, 1.0, //
                0.0, 1.0, 1.0, //
                1.0, 1.0, 1.0,
            ],
        )
    }

    /// Records the calls the sampling policy makes.
    #[derive(Default)]
    struct RecordingService {
        points: Vec<Point3<f64>>,
        locked: Vec<bool>,
        lloyd_calls: Vec<usize>,
        newton_calls: Vec<usize>,
    }

    impl RelaxationService for RecordingService {
        fn compute_initial_sampling(&mut self, count: usize) -> Result<()> {
            self.points = (0..count).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
            self.locked = vec![false; count];
            Ok(())
        }
        fn resize_points(&mut self, count: usize) {
            self.points.resize(count, Point3::origin());
            self.locked.resize(count, false);
        }
        fn nb_points(&self) -> usize {
            self.points.len()
        }
        fn set_point(&mut self, index: usize, position: Point3<f64>) {
            self.points[index] = position;
        }
        fn lock_point(&mut self, index: usize) {
            self.locked[index] = true;
        }
        fn unlock_point(&mut self, index: usize) {
            self.locked[index] = false;
        }
        fn unlock_all_points(&mut self) {
            self.locked.fill(false);
        }
        fn is_locked(&self, index: usize) -> bool {
            self.locked[index]
        }
        fn embedding(&self) -> &[Point3<f64>] {
            &self.points
        }
        fn lloyd_iterations(&mut self, rounds: usize, _: RoundControl<'_>) -> RelaxOutcome {
            self.lloyd_calls.push(rounds);
            RelaxOutcome {
                requested: rounds,
                completed: rounds,
                cancelled: false,
            }
        }
        fn newton_iterations(&mut self, rounds: usize, _: RoundControl<'_>) -> RelaxOutcome {
            self.newton_calls.push(rounds);
            RelaxOutcome {
                requested: rounds,
                completed: rounds,
                cancelled: false,
            }
        }
    }

    #[test]
    fn test_policy_locks_appended_points() {
        let mut service = RecordingService::default();
        let locked = [Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0)];

        let (lloyd, newton) =
            relax_with_locked(&mut service, 4, &locked, 3, 0, &SamplingControl::default()).unwrap();

        assert_eq!(service.nb_points(), 6);
        assert_eq!(&service.embedding()[4..], &locked[..]);
        assert!((0..4).all(|i| !service.is_locked(i)));
        assert!(service.is_locked(4) && service.is_locked(5));
        assert_eq!(service.lloyd_calls, vec![3]);
        assert!(service.newton_calls.is_empty());
        assert_eq!(lloyd.completed, 3);
        assert_eq!(newton, RelaxOutcome::skipped());
    }

    #[test]
    fn test_output_size_and_layout() {
        let vertices = cube_vertices();
        let options = VolumeSampleOptions::new(20, 0.25)
            .with_lloyd_rounds(2)
            .with_newton_rounds(1);
        let samples = sample_volume(&vertices, &options).unwrap();

        assert_eq!(samples.len(), 20 + 8 + 8);
        assert_eq!(samples.free_samples().len(), 20);
        assert_eq!(samples.input_vertices().len(), 8);
        assert_eq!(samples.box_corners().len(), 8);
        assert_eq!(samples.to_matrix().shape(), (36, 3));
        assert_eq!(samples.lloyd.completed, 2);
        assert_eq!(samples.newton.completed, 1);
    }

    #[test]
    fn test_locked_points_unchanged() {
        let vertices = cube_vertices();
        let options = VolumeSampleOptions::new(12, 0.5).with_lloyd_rounds(3);
        let samples = sample_volume(&vertices, &options).unwrap();

        for (r, p) in samples.input_vertices().iter().enumerate() {
            for c in 0..3 {
                assert_eq!(p[c], vertices[(r, c)]);
            }
        }

        let expected = box_corners(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0), 0.5);
        assert_eq!(samples.box_corners(), &expected[..]);
    }

    #[test]
    fn test_box_corners_are_padded_extremes() {
        let vertices = DMatrix::from_row_slice(2, 3, &[-1.0, 2.0, 0.0, 3.0, 4.0, 1.0]);
        let samples = sample_volume(&vertices, &VolumeSampleOptions::new(8, 0.5).with_lloyd_rounds(1)).unwrap();

        let lo = [-1.5, 1.5, -0.5];
        let hi = [3.5, 4.5, 1.5];
        for corner in samples.box_corners() {
            for c in 0..3 {
                assert!(corner[c] == lo[c] || corner[c] == hi[c]);
            }
        }
        for p in samples.free_samples() {
            for c in 0..3 {
                assert!(p[c] >= lo[c] - 1e-9 && p[c] <= hi[c] + 1e-9);
            }
        }
    }

    #[test]
    fn test_zero_rounds_keep_initial_sampling() {
        let vertices = cube_vertices();
        let options = VolumeSampleOptions::new(10, 0.2)
            .with_lloyd_rounds(0)
            .with_seed(9);
        let samples = sample_volume(&vertices, &options).unwrap();

        let domain: KernelMesh =
            box_mesh(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0), 0.2).unwrap();
        let mut cvt = CentroidalVoronoi::new(&domain, true, CvtOptions::default().with_seed(9)).unwrap();
        cvt.compute_initial_sampling(10).unwrap();

        assert_eq!(samples.free_samples(), cvt.embedding());
        assert_eq!(samples.lloyd, RelaxOutcome::skipped());
        assert_eq!(samples.newton, RelaxOutcome::skipped());
    }

    #[test]
    fn test_cancelled_lloyd_still_runs_newton() {
        let control = SamplingControl::default();
        control.lloyd_cancel.cancel();

        let options = VolumeSampleOptions::new(10, 0.2)
            .with_lloyd_rounds(5)
            .with_newton_rounds(2);
        let samples = sample_volume_with_control(&cube_vertices(), &options, &control).unwrap();

        assert!(samples.lloyd.cancelled);
        assert_eq!(samples.lloyd.completed, 0);
        assert!(!samples.newton.cancelled);
        assert_eq!(samples.newton.completed, 2);
        assert_eq!(samples.len(), 26);
    }

    #[test]
    fn test_shared_token_truncates_both_phases() {
        let token = CancelToken::new();
        let watcher = token.clone();
        let control = SamplingControl::shared(token).with_progress(Progress::new(
            move |current, _, message| {
                if message == "Lloyd" && current == 1 {
                    watcher.cancel();
                }
            },
        ));

        let options = VolumeSampleOptions::new(10, 0.2)
            .with_lloyd_rounds(4)
            .with_newton_rounds(4);
        let samples = sample_volume_with_control(&cube_vertices(), &options, &control).unwrap();

        assert_eq!(samples.lloyd.completed, 1);
        assert!(samples.lloyd.cancelled);
        assert_eq!(samples.newton.completed, 0);
        assert!(samples.newton.cancelled);
    }

    #[test]
    fn test_preconditions() {
        let vertices = cube_vertices();
        assert!(matches!(
            sample_volume(&vertices, &VolumeSampleOptions::new(3, 0.1)),
            Err(MeshError::InvalidParameter { name: "num_samples", .. })
        ));
        assert!(matches!(
            sample_volume(&vertices, &VolumeSampleOptions::new(10, -1.0)),
            Err(MeshError::InvalidParameter { name: "padding", .. })
        ));
        assert_eq!(
            sample_volume(&DMatrix::zeros(0, 3), &VolumeSampleOptions::new(10, 0.1)).err(),
            Some(MeshError::EmptyMesh)
        );
        assert!(matches!(
            sample_volume(&DMatrix::zeros(4, 5), &VolumeSampleOptions::new(10, 0.1)),
            Err(MeshError::DimensionMismatch { found: 5, .. })
        ));
    }

    #[test]
    fn test_planar_input_with_padding() {
        // 2D input lifted to z = 0; padding gives the box its thickness.
        let vertices = DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        let samples = sample_volume(&vertices, &VolumeSampleOptions::new(6, 0.1).with_lloyd_rounds(1)).unwrap();
        assert_eq!(samples.len(), 6 + 3 + 8);
        assert_eq!(samples.input_vertices()[2], Point3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_resample_surface() {
        let sphere = sphere_arrays(&Point3::origin(), 1.0, 10).unwrap();
        let options = SurfaceSampleOptions::new(24).with_lloyd_rounds(2);
        let samples = resample_surface(&sphere.vertices, &sphere.faces, &options).unwrap();

        assert_eq!(samples.points().len(), 24);
        assert_eq!(samples.to_matrix().shape(), (24, 3));
        assert_eq!(samples.lloyd.completed, 2);
        for p in samples.points() {
            assert!(p.coords.norm() <= 1.0 + 1e-9);
            assert!(p.coords.norm() > 0.7);
        }

        assert!(resample_surface(&sphere.vertices, &sphere.faces, &SurfaceSampleOptions::new(2)).is_err());
    }
}
