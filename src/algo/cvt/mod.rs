//! Constrained centroidal Voronoi tessellation.
//!
//! A [`RelaxationService`] owns a set of sites over a domain mesh and moves
//! them towards the centroids of their Voronoi cells. Sites can be locked,
//! in which case they still claim their Voronoi cell but never move.
//!
//! [`CentroidalVoronoi`] is the bundled implementation. Voronoi cells are
//! integrated by Monte-Carlo: a fixed cloud of uniformly distributed
//! quadrature points is drawn over the domain (tetrahedra in volumetric mode,
//! facets in surface mode) and each point is assigned to its nearest site.
//!
//! # Lloyd and Newton rounds
//!
//! A Lloyd round moves every free site to the centroid of its cell. A Newton
//! round uses the diagonal of the CVT energy Hessian (twice the cell mass for
//! each site). With that Hessian the quasi-Newton direction points at the
//! centroid as well, so the step length is chosen by backtracking from
//! [`CvtOptions::newton_step`] towards a plain Lloyd step until the discrete
//! energy decreases.
//!
//! # Example
//!
//! ```
//! use nalgebra::Point3;
//! use tetsample::algo::cvt::{CentroidalVoronoi, CvtOptions, RelaxationService};
//! use tetsample::algo::{CancelToken, Progress, RoundControl};
//! use tetsample::domain::box_mesh;
//! use tetsample::mesh::KernelMesh;
//!
//! let domain: KernelMesh = box_mesh(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0), 0.0).unwrap();
//! let mut cvt = CentroidalVoronoi::new(&domain, true, CvtOptions::default()).unwrap();
//! cvt.compute_initial_sampling(32).unwrap();
//! cvt.lock_point(0);
//! let pinned = cvt.embedding()[0];
//!
//! let progress = Progress::none();
//! let cancel = CancelToken::new();
//! let outcome = cvt.lloyd_iterations(3, RoundControl::new(&progress, &cancel));
//! assert_eq!(outcome.completed, 3);
//! assert_eq!(cvt.embedding()[0], pinned);
//! ```

mod grid;
mod quadrature;

use nalgebra::{Point3, Vector3};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use rayon::prelude::*;

use crate::error::{MeshError, Result};
use crate::mesh::{KernelMesh, MeshIndex};

use super::progress::{run_rounds, RelaxOutcome, RoundControl};
use grid::SiteGrid;
use quadrature::DomainSampler;

/// Stream offset separating the quadrature cloud from the initial sites.
const QUADRATURE_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

/// Operations a site relaxation backend provides to the samplers.
///
/// Indices are positions in [`embedding`](Self::embedding). Out-of-range
/// indices are a caller bug and panic.
pub trait RelaxationService {
    /// Replace all sites by `count` random sites over the domain, all unlocked.
    fn compute_initial_sampling(&mut self, count: usize) -> Result<()>;

    /// Grow or shrink the site array. New sites sit at the origin, unlocked.
    fn resize_points(&mut self, count: usize);

    /// Number of sites.
    fn nb_points(&self) -> usize;

    /// Overwrite the position of a site.
    fn set_point(&mut self, index: usize, position: Point3<f64>);

    /// Pin a site in place for subsequent relaxation rounds.
    fn lock_point(&mut self, index: usize);

    /// Release a pinned site.
    fn unlock_point(&mut self, index: usize);

    /// Release every pinned site.
    fn unlock_all_points(&mut self);

    /// Whether a site is pinned.
    fn is_locked(&self, index: usize) -> bool;

    /// Current site positions.
    fn embedding(&self) -> &[Point3<f64>];

    /// Run up to `rounds` Lloyd rounds.
    fn lloyd_iterations(&mut self, rounds: usize, control: RoundControl<'_>) -> RelaxOutcome;

    /// Run up to `rounds` Newton rounds.
    fn newton_iterations(&mut self, rounds: usize, control: RoundControl<'_>) -> RelaxOutcome;
}

/// Options for [`CentroidalVoronoi`].
#[derive(Debug, Clone, PartialEq)]
pub struct CvtOptions {
    /// Quadrature points drawn per site.
    ///
    /// Default: 24
    pub quadrature_per_point: usize,

    /// Longest step tried by a Newton round, as a multiple of the Lloyd step.
    ///
    /// Default: 1.6
    pub newton_step: f64,

    /// Seed for the initial sites and the quadrature cloud.
    ///
    /// Default: 0
    pub seed: u64,
}

impl Default for CvtOptions {
    fn default() -> Self {
        Self {
            quadrature_per_point: 24,
            newton_step: 1.6,
            seed: 0,
        }
    }
}

impl CvtOptions {
    /// Set the number of quadrature points per site.
    pub fn with_quadrature_per_point(mut self, count: usize) -> Self {
        self.quadrature_per_point = count;
        self
    }

    /// Set the longest Newton step.
    pub fn with_newton_step(mut self, step: f64) -> Self {
        self.newton_step = step;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.quadrature_per_point == 0 {
            return Err(MeshError::invalid_param(
                "quadrature_per_point",
                self.quadrature_per_point,
                "must be positive",
            ));
        }
        if !(self.newton_step >= 1.0 && self.newton_step < 2.0) {
            return Err(MeshError::invalid_param(
                "newton_step",
                self.newton_step,
                "must be in [1, 2)",
            ));
        }
        Ok(())
    }
}

/// Voronoi cells of the current sites, integrated over the quadrature cloud.
struct CellMoments {
    centroids: Vec<Option<Point3<f64>>>,
    energy: f64,
}

/// Centroidal Voronoi relaxation over a borrowed domain mesh.
///
/// In volumetric mode the domain is the tetrahedra of the mesh, otherwise its
/// facets, and relaxed sites are projected back onto the nearest facet.
pub struct CentroidalVoronoi<'a, I: MeshIndex = u32> {
    mesh: &'a KernelMesh<I>,
    domain: DomainSampler,
    options: CvtOptions,
    points: Vec<Point3<f64>>,
    locked: Vec<bool>,
    quadrature: Vec<Point3<f64>>,
}

impl<'a, I: MeshIndex> CentroidalVoronoi<'a, I> {
    /// Bind a relaxation to `mesh`.
    ///
    /// Volumetric mode needs tetrahedral cells, surface mode needs facets.
    pub fn new(mesh: &'a KernelMesh<I>, volumetric: bool, options: CvtOptions) -> Result<Self> {
        options.validate()?;
        let domain = if volumetric {
            DomainSampler::volume(mesh)?
        } else {
            DomainSampler::surface(mesh)?
        };
        log::debug!(
            "CVT domain: {} mode, measure {:.6e}",
            if volumetric { "volumetric" } else { "surface" },
            domain.measure()
        );

        Ok(Self {
            mesh,
            domain,
            options,
            points: Vec::new(),
            locked: Vec::new(),
            quadrature: Vec::new(),
        })
    }

    /// The domain mesh.
    pub fn mesh(&self) -> &'a KernelMesh<I> {
        self.mesh
    }

    /// Whether sites live in the volume (as opposed to on the surface).
    pub fn is_volumetric(&self) -> bool {
        !self.domain.is_surface()
    }

    /// Mean squared distance from a quadrature point to its nearest site.
    pub fn energy(&mut self) -> f64 {
        self.ensure_quadrature();
        self.moments(&self.points).map_or(0.0, |m| m.energy)
    }

    fn ensure_quadrature(&mut self) {
        let wanted = self.options.quadrature_per_point * self.points.len();
        if self.quadrature.len() == wanted {
            return;
        }
        let mut rng = Pcg64::seed_from_u64(self.options.seed ^ QUADRATURE_STREAM);
        self.quadrature = (0..wanted).map(|_| self.domain.sample(&mut rng)).collect();
        log::debug!("CVT quadrature: {} points", wanted);
    }

    fn assign(&self, sites: &[Point3<f64>]) -> Option<Vec<(usize, f64)>> {
        let grid = SiteGrid::new(sites);
        self.quadrature
            .par_iter()
            .map(|q| grid.nearest(sites, q))
            .collect()
    }

    fn moments(&self, sites: &[Point3<f64>]) -> Option<CellMoments> {
        let assignment = self.assign(sites)?;

        let mut sums = vec![Vector3::zeros(); sites.len()];
        let mut counts = vec![0usize; sites.len()];
        let mut energy = 0.0;
        for (q, &(site, d2)) in self.quadrature.iter().zip(&assignment) {
            sums[site] += q.coords;
            counts[site] += 1;
            energy += d2;
        }

        let centroids = sums
            .into_iter()
            .zip(counts)
            .map(|(sum, count)| (count > 0).then(|| Point3::from(sum / count as f64)))
            .collect();

        Some(CellMoments {
            centroids,
            energy: energy / assignment.len().max(1) as f64,
        })
    }

    /// Move every free site a fraction `t` of the way to its centroid.
    fn stepped(&self, centroids: &[Option<Point3<f64>>], t: f64) -> Vec<Point3<f64>> {
        let domain = &self.domain;
        let surface = domain.is_surface();
        self.points
            .par_iter()
            .zip(centroids.par_iter())
            .zip(self.locked.par_iter())
            .map(|((x, c), &locked)| match c {
                Some(c) if !locked => {
                    let moved = x + (c - x) * t;
                    if surface {
                        domain.project(&moved)
                    } else {
                        moved
                    }
                }
                _ => *x,
            })
            .collect()
    }

    fn lloyd_round(&mut self) {
        if let Some(m) = self.moments(&self.points) {
            self.points = self.stepped(&m.centroids, 1.0);
        }
    }

    fn newton_round(&mut self) {
        let Some(m) = self.moments(&self.points) else {
            return;
        };

        let mut t = self.options.newton_step;
        while t > 1.0 {
            let candidate = self.stepped(&m.centroids, t);
            let energy = self.moments(&candidate).map_or(f64::INFINITY, |c| c.energy);
            if energy < m.energy {
                self.points = candidate;
                return;
            }
            t = 1.0 + (t - 1.0) * 0.5;
            if t < 1.05 {
                break;
            }
        }
        self.points = self.stepped(&m.centroids, 1.0);
    }
}

impl<I: MeshIndex> RelaxationService for CentroidalVoronoi<'_, I> {
    fn compute_initial_sampling(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(MeshError::invalid_param("count", count, "must be positive"));
        }
        let mut rng = Pcg64::seed_from_u64(self.options.seed);
        self.points = (0..count).map(|_| self.domain.sample(&mut rng)).collect();
        self.locked = vec![false; count];
        log::debug!("CVT initial sampling: {} sites", count);
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

    fn lloyd_iterations(&mut self, rounds: usize, control: RoundControl<'_>) -> RelaxOutcome {
        if rounds == 0 || self.points.is_empty() {
            return RelaxOutcome {
                requested: rounds,
                ..RelaxOutcome::skipped()
            };
        }
        self.ensure_quadrature();
        run_rounds(rounds, "Lloyd", control, |_| self.lloyd_round())
    }

    fn newton_iterations(&mut self, rounds: usize, control: RoundControl<'_>) -> RelaxOutcome {
        if rounds == 0 || self.points.is_empty() {
            return RelaxOutcome {
                requested: rounds,
                ..RelaxOutcome::skipped()
            };
        }
        self.ensure_quadrature();
        run_rounds(rounds, "Newton", control, |_| self.newton_round())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::progress::{CancelToken, Progress};
    use crate::domain::{box_mesh, sphere_mesh};

    fn unit_box() -> KernelMesh {
        box_mesh(&Point3::origin(), &Point3::new(1.0, 1.0, 1.0), 0.0).unwrap()
    }

    fn inside_unit_box(p: &Point3<f64>) -> bool {
        (0..3).all(|i| p[i] >= -1e-9 && p[i] <= 1.0 + 1e-9)
    }

    #[test]
    fn test_initial_sampling_is_seeded() {
        let domain = unit_box();
        let mut a = CentroidalVoronoi::new(&domain, true, CvtOptions::default().with_seed(3)).unwrap();
        let mut b = CentroidalVoronoi::new(&domain, true, CvtOptions::default().with_seed(3)).unwrap();
        a.compute_initial_sampling(50).unwrap();
        b.compute_initial_sampling(50).unwrap();

        assert_eq!(a.embedding(), b.embedding());
        assert_eq!(a.nb_points(), 50);
        assert!(a.embedding().iter().all(inside_unit_box));
        assert!((0..50).all(|i| !a.is_locked(i)));
    }

    #[test]
    fn test_lloyd_reduces_energy() {
        let domain = unit_box();
        let mut cvt = CentroidalVoronoi::new(&domain, true, CvtOptions::default()).unwrap();
        cvt.compute_initial_sampling(64).unwrap();

        let before = cvt.energy();
        let (progress, cancel) = (Progress::none(), CancelToken::new());
        let outcome = cvt.lloyd_iterations(5, RoundControl::new(&progress, &cancel));
        let after = cvt.energy();

        assert_eq!(outcome.completed, 5);
        assert!(after < before, "energy {} -> {}", before, after);
        assert!(cvt.embedding().iter().all(inside_unit_box));
    }

    #[test]
    fn test_newton_does_not_increase_energy() {
        let domain = unit_box();
        let mut cvt = CentroidalVoronoi::new(&domain, true, CvtOptions::default()).unwrap();
        cvt.compute_initial_sampling(64).unwrap();
        let (progress, cancel) = (Progress::none(), CancelToken::new());
        cvt.lloyd_iterations(2, RoundControl::new(&progress, &cancel));

        let before = cvt.energy();
        let outcome = cvt.newton_iterations(3, RoundControl::new(&progress, &cancel));
        assert_eq!(outcome.completed, 3);
        assert!(cvt.energy() <= before * (1.0 + 1e-9));
    }

    #[test]
    fn test_locked_points_never_move() {
        let domain = unit_box();
        let mut cvt = CentroidalVoronoi::new(&domain, true, CvtOptions::default()).unwrap();
        cvt.compute_initial_sampling(40).unwrap();
        cvt.resize_points(42);
        cvt.set_point(40, Point3::new(0.5, 0.5, 0.5));
        cvt.set_point(41, Point3::new(1.0, 1.0, 1.0));
        cvt.lock_point(40);
        cvt.lock_point(41);
        cvt.lock_point(3);
        let pinned = cvt.embedding()[3];

        let (progress, cancel) = (Progress::none(), CancelToken::new());
        cvt.lloyd_iterations(3, RoundControl::new(&progress, &cancel));
        cvt.newton_iterations(2, RoundControl::new(&progress, &cancel));

        assert_eq!(cvt.embedding()[40], Point3::new(0.5, 0.5, 0.5));
        assert_eq!(cvt.embedding()[41], Point3::new(1.0, 1.0, 1.0));
        assert_eq!(cvt.embedding()[3], pinned);

        cvt.unlock_point(3);
        assert!(!cvt.is_locked(3));
        cvt.unlock_all_points();
        assert!(!cvt.is_locked(40) && !cvt.is_locked(41));
    }

    #[test]
    fn test_zero_rounds_leave_points() {
        let domain = unit_box();
        let mut cvt = CentroidalVoronoi::new(&domain, true, CvtOptions::default()).unwrap();
        cvt.compute_initial_sampling(10).unwrap();
        let before = cvt.embedding().to_vec();

        let (progress, cancel) = (Progress::none(), CancelToken::new());
        let outcome = cvt.lloyd_iterations(0, RoundControl::new(&progress, &cancel));
        assert_eq!(outcome, RelaxOutcome::skipped());
        assert_eq!(cvt.embedding(), &before[..]);
    }

    #[test]
    fn test_surface_sites_stay_on_sphere() {
        let domain: KernelMesh = sphere_mesh(&Point3::origin(), 1.0, 12).unwrap();
        let mut cvt = CentroidalVoronoi::new(&domain, false, CvtOptions::default()).unwrap();
        assert!(!cvt.is_volumetric());
        cvt.compute_initial_sampling(30).unwrap();

        let (progress, cancel) = (Progress::none(), CancelToken::new());
        cvt.lloyd_iterations(3, RoundControl::new(&progress, &cancel));

        for p in cvt.embedding() {
            let q = cvt.domain.project(p);
            assert!((q - p).norm() < 1e-9);
            assert!(p.coords.norm() <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_invalid_construction() {
        let domain = unit_box();
        assert!(CentroidalVoronoi::new(&domain, false, CvtOptions::default()).is_err());
        assert!(CentroidalVoronoi::new(
            &domain,
            true,
            CvtOptions::default().with_quadrature_per_point(0)
        )
        .is_err());
        assert!(
            CentroidalVoronoi::new(&domain, true, CvtOptions::default().with_newton_step(2.5)).is_err()
        );

        let mut cvt = CentroidalVoronoi::new(&domain, true, CvtOptions::default()).unwrap();
        assert!(cvt.compute_initial_sampling(0).is_err());
    }
}
