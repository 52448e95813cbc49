//! JSON summary and GeoJSON export

use crate::{ClusterAnalysis, PipelineConfig, Result};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::Serialize;
use serde_json::json;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;
use utmk_projection::{GeoPoint, PlanarPoint};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub input: String,
    pub config: PipelineConfig,
    pub total_rows: usize,
    pub skipped_rows: usize,
    pub facility_count: usize,
    pub cluster_count: usize,
    pub clusters: Vec<ClusterSummary>,
    pub facilities: Vec<FacilitySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub id: usize,
    pub size: usize,
    pub centroid: PlanarPoint,
    pub centroid_geo: GeoPoint,
    pub representative: String,
    pub representative_row: usize,
    pub mean_score: f64,
    pub has_boundary: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacilitySummary {
    pub row: usize,
    pub name: String,
    pub subdivision: String,
    pub longitude: f64,
    pub latitude: f64,
    pub distance_m: f64,
    pub score: u8,
    pub cluster_id: usize,
    pub centroid_distance: f64,
    pub representative: bool,
}

impl RunSummary {
    pub fn new(
        analysis: &ClusterAnalysis,
        input: impl AsRef<Path>,
        total_rows: usize,
        skipped_rows: usize,
    ) -> Self {
        let clusters: Vec<ClusterSummary> = analysis
            .clusters
            .iter()
            .map(|c| {
                let rep = &analysis.facilities[c.representative].facility;
                ClusterSummary {
                    id: c.id,
                    size: c.len(),
                    centroid: c.centroid,
                    centroid_geo: c.centroid_geo,
                    representative: rep.name.clone(),
                    representative_row: rep.row,
                    mean_score: c.mean_score,
                    has_boundary: c.boundary.is_some(),
                }
            })
            .collect();

        let facilities = analysis
            .facilities
            .iter()
            .enumerate()
            .map(|(i, f)| FacilitySummary {
                row: f.facility.row,
                name: f.facility.name.clone(),
                subdivision: f.facility.subdivision.clone(),
                longitude: f.facility.longitude,
                latitude: f.facility.latitude,
                distance_m: f.facility.distance_m,
                score: f.score,
                cluster_id: f.cluster_id,
                centroid_distance: f.centroid_distance,
                representative: analysis
                    .cluster(f.cluster_id)
                    .map_or(false, |c| c.representative == i),
            })
            .collect();

        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            input: input.as_ref().display().to_string(),
            config: analysis.config.clone(),
            total_rows,
            skipped_rows,
            facility_count: analysis.facilities.len(),
            cluster_count: clusters.len(),
            clusters,
            facilities,
        }
    }
}

fn properties(value: serde_json::Value) -> Option<JsonObject> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

fn feature(geometry: Geometry, props: serde_json::Value) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: properties(props),
        foreign_members: None,
    }
}

/// Facilities, representatives and boundaries as one FeatureCollection
pub fn to_geojson(analysis: &ClusterAnalysis) -> FeatureCollection {
    let mut features = Vec::new();

    for (i, f) in analysis.facilities.iter().enumerate() {
        let is_rep = analysis
            .cluster(f.cluster_id)
            .map_or(false, |c| c.representative == i);
        features.push(feature(
            Geometry::new(Value::Point(vec![f.facility.longitude, f.facility.latitude])),
            json!({
                "kind": "facility",
                "name": f.facility.name,
                "subdivision": f.facility.subdivision,
                "distance_m": f.facility.distance_m,
                "score": f.score,
                "cluster_id": f.cluster_id,
                "centroid_distance": f.centroid_distance,
                "representative": is_rep,
            }),
        ));
    }

    for c in &analysis.clusters {
        if let Some(hull) = &c.boundary {
            features.push(feature(
                Geometry::new(Value::from(hull)),
                json!({
                    "kind": "cluster_boundary",
                    "cluster_id": c.id,
                    "size": c.len(),
                    "mean_score": c.mean_score,
                }),
            ));
        }
    }

    for s in &analysis.subdivisions {
        features.push(feature(
            Geometry::new(Value::from(&s.hull)),
            json!({
                "kind": "subdivision_boundary",
                "name": s.name,
            }),
        ));
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

pub fn write_summary(summary: &RunSummary, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    info!("Writing summary to {:?}", path);
    write_json(summary, path)
}

pub fn write_geojson(analysis: &ClusterAnalysis, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    info!("Writing GeoJSON to {:?}", path);
    write_json(&to_geojson(analysis), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analyze;
    use crate::{ClusterStrategy, Facility};
    use utmk_projection::TransverseMercator;

    fn analysis() -> ClusterAnalysis {
        let tm = TransverseMercator::utm_k();
        let facilities = [
            (127.00, 37.00, 20.0),
            (127.01, 37.00, 90.0),
            (127.00, 37.01, 150.0),
            (127.50, 37.50, 700.0),
        ]
        .iter()
        .enumerate()
        .map(|(i, (lon, lat, d))| {
            let p = tm.forward(GeoPoint::new(*lon, *lat)).unwrap();
            Facility {
                row: i + 2,
                name: format!("Hall {}", i + 1),
                subdivision: "Buk-myeon".to_string(),
                longitude: *lon,
                latitude: *lat,
                x: p.x,
                y: p.y,
                distance_m: *d,
            }
        })
        .collect();
        let config = PipelineConfig {
            strategy: ClusterStrategy::Global { k: 2 },
            ..PipelineConfig::default()
        };
        analyze(facilities, &config, &tm).unwrap()
    }

    #[test]
    fn test_summary_counts() {
        let a = analysis();
        let summary = RunSummary::new(&a, "halls.xlsx", 6, 2);
        assert_eq!(summary.facility_count, 4);
        assert_eq!(summary.cluster_count, 2);
        assert_eq!(summary.skipped_rows, 2);
        assert_eq!(summary.facilities.iter().filter(|f| f.representative).count(), 2);
        let sizes: usize = summary.clusters.iter().map(|c| c.size).sum();
        assert_eq!(sizes, 4);
    }

    #[test]
    fn test_geojson_features() {
        let a = analysis();
        let fc = to_geojson(&a);
        let kinds: Vec<String> = fc
            .features
            .iter()
            .filter_map(|f| f.properties.as_ref()?.get("kind")?.as_str().map(String::from))
            .collect();
        assert_eq!(kinds.iter().filter(|k| *k == "facility").count(), 4);
        assert_eq!(kinds.iter().filter(|k| *k == "cluster_boundary").count(), 1);
        assert_eq!(kinds.iter().filter(|k| *k == "subdivision_boundary").count(), 1);
    }

    #[test]
    fn test_write_files() {
        let a = analysis();
        let dir = tempfile::tempdir().unwrap();
        let summary_path = dir.path().join("summary.json");
        let geojson_path = dir.path().join("clusters.geojson");

        write_summary(&RunSummary::new(&a, "halls.xlsx", 4, 0), &summary_path).unwrap();
        write_geojson(&a, &geojson_path).unwrap();

        let summary: serde_json::Value =
            serde_json::from_reader(File::open(&summary_path).unwrap()).unwrap();
        assert_eq!(summary["config"]["strategy"]["strategy"], "global");
        assert_eq!(summary["config"]["strategy"]["k"], 2);

        let fc: serde_json::Value =
            serde_json::from_reader(File::open(&geojson_path).unwrap()).unwrap();
        assert_eq!(fc["type"], "FeatureCollection");
    }
}
