//! End-to-end analysis: score → cluster → representatives → boundaries

use crate::boundary::subdivision_boundaries;
use crate::clusterer::{partition, ClusterStrategy, KMeansSettings};
use crate::scorer::{score_facilities, ScoreScale};
use crate::selector::build_clusters;
use crate::{AssignedFacility, ClusterAnalysis, ClusterError, Facility, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use utmk_projection::TransverseMercator;

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub strategy: ClusterStrategy,
    pub scale: ScoreScale,
    pub seed: u64,
    pub n_init: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let kmeans = KMeansSettings::default();
        Self {
            strategy: ClusterStrategy::default(),
            scale: ScoreScale::default(),
            seed: kmeans.seed,
            n_init: kmeans.n_init,
            max_iterations: kmeans.max_iterations,
            tolerance: kmeans.tolerance,
        }
    }
}

impl PipelineConfig {
    pub fn kmeans(&self) -> KMeansSettings {
        KMeansSettings {
            seed: self.seed,
            n_init: self.n_init,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

/// Score, cluster and summarize `facilities`
pub fn analyze(
    facilities: Vec<Facility>,
    config: &PipelineConfig,
    projection: &TransverseMercator,
) -> Result<ClusterAnalysis> {
    if facilities.is_empty() {
        return Err(ClusterError::NoFacilities);
    }

    let scored = score_facilities(facilities, config.scale);
    let partition = partition(&scored, config.strategy, &config.kmeans())?;

    let assigned: Vec<AssignedFacility> = scored
        .into_iter()
        .zip(&partition.assignments)
        .map(|(s, a)| AssignedFacility {
            facility: s.facility,
            score: s.score,
            cluster_id: a.cluster_id,
            centroid_distance: a.centroid_distance,
        })
        .collect();

    let clusters = build_clusters(&assigned, &partition.centroids, projection)?;
    let subdivisions = subdivision_boundaries(&assigned);

    info!(
        "Analysis complete: {} facilities, {} clusters ({} with boundary), {} subdivision outlines",
        assigned.len(),
        clusters.len(),
        clusters.iter().filter(|c| c.boundary.is_some()).count(),
        subdivisions.len()
    );

    Ok(ClusterAnalysis {
        facilities: assigned,
        clusters,
        subdivisions,
        config: config.clone(),
    })
}
