//! Cluster assignment strategies

use crate::kmeans::{self, KMeansConfig};
use crate::{Result, ScoredFacility, SUBDIVISION_SPLIT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use utmk_projection::PlanarPoint;

/// How facilities are partitioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum ClusterStrategy {
    /// Split every subdivision into two sub-clusters
    #[default]
    PerSubdivision,
    /// One k-means over every facility
    Global { k: usize },
}

/// Cluster id and centroid distance for one facility
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assignment {
    pub cluster_id: usize,
    pub centroid_distance: f64,
}

/// Result of partitioning, parallel to the input slice
#[derive(Debug, Clone)]
pub struct Partition {
    pub assignments: Vec<Assignment>,
    /// Centroids of the non-empty clusters, by id
    pub centroids: BTreeMap<usize, PlanarPoint>,
    /// Ids handed out, including those of clusters that ended up empty
    pub ids_allocated: usize,
}

/// k-means parameters shared by both strategies
#[derive(Debug, Clone, Copy)]
pub struct KMeansSettings {
    pub seed: u64,
    pub n_init: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for KMeansSettings {
    fn default() -> Self {
        Self {
            seed: crate::DEFAULT_SEED,
            n_init: kmeans::DEFAULT_N_INIT,
            max_iterations: kmeans::DEFAULT_MAX_ITERATIONS,
            tolerance: kmeans::DEFAULT_TOLERANCE,
        }
    }
}

impl KMeansSettings {
    fn config(&self, k: usize) -> KMeansConfig {
        KMeansConfig {
            k,
            seed: self.seed,
            n_init: self.n_init,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

/// Partition facilities according to `strategy`
pub fn partition(
    facilities: &[ScoredFacility],
    strategy: ClusterStrategy,
    settings: &KMeansSettings,
) -> Result<Partition> {
    let partition = match strategy {
        ClusterStrategy::PerSubdivision => partition_by_subdivision(facilities, settings)?,
        ClusterStrategy::Global { k } => partition_global(facilities, k, settings)?,
    };

    info!(
        "Partitioned {} facilities into {} clusters ({} ids allocated)",
        facilities.len(),
        partition.centroids.len(),
        partition.ids_allocated
    );

    Ok(partition)
}

fn partition_global(
    facilities: &[ScoredFacility],
    k: usize,
    settings: &KMeansSettings,
) -> Result<Partition> {
    let points: Vec<PlanarPoint> = facilities.iter().map(|f| f.facility.planar()).collect();
    let fit = kmeans::fit(&points, &settings.config(k))?;

    let sizes = fit.cluster_sizes();
    let centroids = fit
        .centroids
        .iter()
        .enumerate()
        .filter(|(id, _)| sizes[*id] > 0)
        .map(|(id, c)| (id, *c))
        .collect();

    let assignments = fit
        .labels
        .iter()
        .zip(&fit.distances)
        .map(|(&cluster_id, &centroid_distance)| Assignment {
            cluster_id,
            centroid_distance,
        })
        .collect();

    Ok(Partition {
        assignments,
        centroids,
        ids_allocated: k,
    })
}

fn partition_by_subdivision(
    facilities: &[ScoredFacility],
    settings: &KMeansSettings,
) -> Result<Partition> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, f) in facilities.iter().enumerate() {
        groups
            .entry(f.facility.subdivision.as_str())
            .or_default()
            .push(i);
    }

    let mut assignments = vec![
        Assignment {
            cluster_id: 0,
            centroid_distance: 0.0,
        };
        facilities.len()
    ];
    let mut centroids = BTreeMap::new();
    let mut next_id = 0;

    for (name, members) in groups {
        if members.len() < SUBDIVISION_SPLIT {
            for &i in &members {
                assignments[i] = Assignment {
                    cluster_id: next_id,
                    centroid_distance: 0.0,
                };
                centroids.insert(next_id, facilities[i].facility.planar());
            }
            debug!("Subdivision {}: singleton cluster {}", name, next_id);
            next_id += 1;
            continue;
        }

        let points: Vec<PlanarPoint> = members
            .iter()
            .map(|&i| facilities[i].facility.planar())
            .collect();
        let fit = kmeans::fit(&points, &settings.config(SUBDIVISION_SPLIT))?;

        for (pos, &i) in members.iter().enumerate() {
            assignments[i] = Assignment {
                cluster_id: next_id + fit.labels[pos],
                centroid_distance: fit.distances[pos],
            };
        }
        for (label, size) in fit.cluster_sizes().into_iter().enumerate() {
            if size > 0 {
                centroids.insert(next_id + label, fit.centroids[label]);
            }
        }

        debug!(
            "Subdivision {}: {} facilities -> clusters {}..{}",
            name,
            members.len(),
            next_id,
            next_id + SUBDIVISION_SPLIT - 1
        );
        next_id += SUBDIVISION_SPLIT;
    }

    Ok(Partition {
        assignments,
        centroids,
        ids_allocated: next_id,
    })
}
