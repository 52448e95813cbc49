//! Seeded k-means on the UTM-K plane
//!
//! k-means++ seeding from a `ChaCha8Rng`, then Lloyd iterations. Runs are
//! reproducible for a given seed and input order.

use crate::{ClusterError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use utmk_projection::PlanarPoint;

pub const DEFAULT_MAX_ITERATIONS: usize = 300;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;
pub const DEFAULT_N_INIT: usize = 1;

#[derive(Debug, Clone)]
pub struct KMeansConfig {
    pub k: usize,
    pub seed: u64,
    /// Independent seedings; the lowest-inertia run wins
    pub n_init: usize,
    pub max_iterations: usize,
    /// Relative to the mean per-axis variance of the input
    pub tolerance: f64,
}

impl KMeansConfig {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            n_init: DEFAULT_N_INIT,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub centroids: Vec<PlanarPoint>,
    /// Cluster index per input point
    pub labels: Vec<usize>,
    /// Distance from each point to its centroid (m)
    pub distances: Vec<f64>,
    /// Sum of squared distances
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeansFit {
    /// Number of points assigned to each centroid
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Fit k-means to `points`
pub fn fit(points: &[PlanarPoint], config: &KMeansConfig) -> Result<KMeansFit> {
    if config.k == 0 || config.k > points.len() {
        return Err(ClusterError::InvalidClusterCount {
            requested: config.k,
            available: points.len(),
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tolerance = absolute_tolerance(points, config.tolerance);

    let mut best: Option<KMeansFit> = None;
    for run in 0..config.n_init.max(1) {
        let seeds = kmeans_plus_plus_init(points, config.k, &mut rng);
        let fit = lloyd(points, seeds, config.max_iterations, tolerance);
        debug!(
            "k-means run {}: k={}, n={}, iterations={}, inertia={:.3}",
            run,
            config.k,
            points.len(),
            fit.iterations,
            fit.inertia
        );
        if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }

    best.ok_or(ClusterError::InvalidClusterCount {
        requested: config.k,
        available: points.len(),
    })
}

fn squared_distance(a: &PlanarPoint, b: &PlanarPoint) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Index and squared distance of the nearest centroid (ties → lowest index)
fn nearest(point: &PlanarPoint, centroids: &[PlanarPoint]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (j, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

fn absolute_tolerance(points: &[PlanarPoint], relative: f64) -> f64 {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let var_x = points.iter().map(|p| (p.x - mean_x).powi(2)).sum::<f64>() / n;
    let var_y = points.iter().map(|p| (p.y - mean_y).powi(2)).sum::<f64>() / n;
    relative * (var_x + var_y) / 2.0
}

/// k-means++ seeding: first center uniform, the rest sampled ∝ D²
fn kmeans_plus_plus_init(
    points: &[PlanarPoint],
    k: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<PlanarPoint> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);

    let mut min_distances: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = min_distances.iter().sum();
        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = None;
            for (i, d) in min_distances.iter().enumerate() {
                acc += d;
                if *d > 0.0 && acc >= target {
                    chosen = Some(i);
                    break;
                }
            }
            // Rounding can leave `acc` just short of `target`
            chosen.unwrap_or_else(|| {
                min_distances
                    .iter()
                    .rposition(|d| *d > 0.0)
                    .unwrap_or(points.len() - 1)
            })
        } else {
            // Every point already coincides with a center
            rng.gen_range(0..points.len())
        };

        let center = points[next];
        for (i, p) in points.iter().enumerate() {
            let d = squared_distance(p, &center);
            if d < min_distances[i] {
                min_distances[i] = d;
            }
        }
        centroids.push(center);
    }

    centroids
}

fn lloyd(
    points: &[PlanarPoint],
    mut centroids: Vec<PlanarPoint>,
    max_iterations: usize,
    tolerance: f64,
) -> KMeansFit {
    let k = centroids.len();
    let mut labels = vec![0usize; points.len()];
    let mut iterations = 0;

    for iter in 0..max_iterations {
        iterations = iter + 1;

        let mut sq_distances = vec![0.0; points.len()];
        for (i, p) in points.iter().enumerate() {
            let (label, d) = nearest(p, &centroids);
            labels[i] = label;
            sq_distances[i] = d;
        }

        let mut sums = vec![(0.0, 0.0); k];
        let mut counts = vec![0usize; k];
        for (p, &label) in points.iter().zip(&labels) {
            sums[label].0 += p.x;
            sums[label].1 += p.y;
            counts[label] += 1;
        }

        let mut updated: Vec<PlanarPoint> = sums
            .iter()
            .zip(&counts)
            .zip(&centroids)
            .map(|(((sx, sy), &count), old)| {
                if count > 0 {
                    PlanarPoint::new(sx / count as f64, sy / count as f64)
                } else {
                    *old
                }
            })
            .collect();

        // Reseed empty clusters at the worst-fit points
        let mut taken = vec![false; points.len()];
        for j in (0..k).filter(|&j| counts[j] == 0) {
            let farthest = sq_distances
                .iter()
                .enumerate()
                .filter(|(i, d)| !taken[*i] && **d > 0.0)
                .fold(None, |acc: Option<(usize, f64)>, (i, d)| match acc {
                    Some((_, best)) if best >= *d => acc,
                    _ => Some((i, *d)),
                });
            if let Some((i, _)) = farthest {
                taken[i] = true;
                updated[j] = points[i];
            }
        }

        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = updated;

        if shift <= tolerance {
            break;
        }
    }

    let mut distances = vec![0.0; points.len()];
    let mut inertia = 0.0;
    for (i, p) in points.iter().enumerate() {
        let (label, d) = nearest(p, &centroids);
        labels[i] = label;
        distances[i] = d.sqrt();
        inertia += d;
    }

    KMeansFit {
        centroids,
        labels,
        distances,
        inertia,
        iterations,
    }
}
