//! Representative selection and per-cluster statistics

use crate::boundary::convex_hull;
use crate::{AssignedFacility, Cluster, Result};
use std::collections::BTreeMap;
use tracing::debug;
use utmk_projection::{GeoPoint, PlanarPoint, TransverseMercator};

/// Index of the member with the smallest centroid distance; the first
/// minimum in input order wins ties.
pub fn representative(facilities: &[AssignedFacility], members: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for &i in members {
        let d = facilities[i].centroid_distance;
        match best {
            Some((_, best_d)) if best_d <= d => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Arithmetic mean of member scores
pub fn mean_score(facilities: &[AssignedFacility], members: &[usize]) -> Option<f64> {
    if members.is_empty() {
        return None;
    }
    let total: u32 = members.iter().map(|&i| facilities[i].score as u32).sum();
    Some(total as f64 / members.len() as f64)
}

/// Build one `Cluster` per non-empty cluster id, ordered by id
pub fn build_clusters(
    facilities: &[AssignedFacility],
    centroids: &BTreeMap<usize, PlanarPoint>,
    projection: &TransverseMercator,
) -> Result<Vec<Cluster>> {
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, f) in facilities.iter().enumerate() {
        members.entry(f.cluster_id).or_default().push(i);
    }

    let mut clusters = Vec::with_capacity(members.len());
    for (id, members) in members {
        let (Some(rep), Some(mean)) = (
            representative(facilities, &members),
            mean_score(facilities, &members),
        ) else {
            continue;
        };

        let centroid = match centroids.get(&id) {
            Some(c) => *c,
            None => planar_mean(facilities, &members),
        };
        let centroid_geo = projection.inverse(centroid)?;

        let points: Vec<GeoPoint> = members.iter().map(|&i| facilities[i].facility.geo()).collect();
        let boundary = convex_hull(&points);

        debug!(
            "Cluster {}: {} members, representative {}, mean score {:.3}, boundary={}",
            id,
            members.len(),
            facilities[rep].facility.name,
            mean,
            boundary.is_some()
        );

        clusters.push(Cluster {
            id,
            members,
            centroid,
            centroid_geo,
            representative: rep,
            mean_score: mean,
            boundary,
        });
    }

    Ok(clusters)
}

fn planar_mean(facilities: &[AssignedFacility], members: &[usize]) -> PlanarPoint {
    let n = members.len() as f64;
    let x = members.iter().map(|&i| facilities[i].facility.x).sum::<f64>() / n;
    let y = members.iter().map(|&i| facilities[i].facility.y).sum::<f64>() / n;
    PlanarPoint::new(x, y)
}
