//! Uniform-grid index over Voronoi sites for nearest-site queries.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::mesh::bounding_box;

/// Sites binned into a uniform grid.
///
/// Cell size is chosen so that there is about one site per cell over the
/// sites' bounding box. Queries farther than a few grid widths from the
/// occupied cells fall back to a linear scan.
pub(crate) struct SiteGrid {
    origin: Point3<f64>,
    cell_size: f64,
    inv_cell_size: f64,
    key_min: [i64; 3],
    key_max: [i64; 3],
    max_rings: i64,
    cells: HashMap<(i64, i64, i64), Vec<u32>>,
}

impl SiteGrid {
    pub(crate) fn new(sites: &[Point3<f64>]) -> Self {
        let (pmin, pmax) = bounding_box(sites).unwrap_or((Point3::origin(), Point3::origin()));
        let extent = (pmax - pmin).max();
        let n = sites.len().max(1) as f64;
        // Coincident sites have no extent; keep cells at a size relative to
        // the coordinates instead.
        let magnitude = pmin.coords.amax().max(pmax.coords.amax()).max(1.0);
        let cell_size = (extent / n.cbrt()).max(1e-9 * magnitude);

        let mut grid = Self {
            origin: pmin,
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            key_min: [i64::MAX; 3],
            key_max: [i64::MIN; 3],
            max_rings: 2 * (n.cbrt().ceil() as i64 + 1),
            cells: HashMap::new(),
        };

        for (i, site) in sites.iter().enumerate() {
            let key = grid.key(site);
            for a in 0..3 {
                grid.key_min[a] = grid.key_min[a].min(key[a]);
                grid.key_max[a] = grid.key_max[a].max(key[a]);
            }
            grid.cells
                .entry((key[0], key[1], key[2]))
                .or_default()
                .push(i as u32);
        }

        grid
    }

    fn key(&self, p: &Point3<f64>) -> [i64; 3] {
        [
            ((p.x - self.origin.x) * self.inv_cell_size).floor() as i64,
            ((p.y - self.origin.y) * self.inv_cell_size).floor() as i64,
            ((p.z - self.origin.z) * self.inv_cell_size).floor() as i64,
        ]
    }

    /// Nearest site to `p` and its squared distance.
    ///
    /// Returns `None` only when the grid holds no sites.
    pub(crate) fn nearest(&self, sites: &[Point3<f64>], p: &Point3<f64>) -> Option<(usize, f64)> {
        if self.cells.is_empty() {
            return None;
        }

        let k = self.key(p);
        let reach = (0..3)
            .map(|a| {
                let lo = k[a].saturating_sub(self.key_min[a]).saturating_abs();
                let hi = k[a].saturating_sub(self.key_max[a]).saturating_abs();
                lo.max(hi)
            })
            .max()
            .unwrap_or(0);
        if reach > self.max_rings {
            return nearest_linear(sites, p);
        }

        let mut best: Option<(usize, f64)> = None;
        for r in 0..=reach {
            for dx in -r..=r {
                for dy in -r..=r {
                    for dz in -r..=r {
                        if dx.abs().max(dy.abs()).max(dz.abs()) != r {
                            continue;
                        }
                        let Some(bucket) = self.cells.get(&(k[0] + dx, k[1] + dy, k[2] + dz)) else {
                            continue;
                        };
                        for &i in bucket {
                            let d2 = (sites[i as usize] - p).norm_squared();
                            if best.map_or(true, |(_, bd)| d2 < bd) {
                                best = Some((i as usize, d2));
                            }
                        }
                    }
                }
            }

            // Sites in ring r + 1 and beyond are at least r cells away.
            let bound = r as f64 * self.cell_size;
            if let Some((_, d2)) = best {
                if d2 <= bound * bound {
                    break;
                }
            }
        }

        best
    }
}

fn nearest_linear(sites: &[Point3<f64>], p: &Point3<f64>) -> Option<(usize, f64)> {
    sites
        .iter()
        .map(|s| (s - p).norm_squared())
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
