//! Facility Access Clusters
//!
//! Scores village facilities by walking distance to the nearest bus stop,
//! groups them with k-means on the UTM-K plane, picks one representative
//! facility per cluster and renders everything on a Leaflet map.
//!
//! # Pipeline
//!
//! ```text
//! load → reproject (EPSG:4326 → EPSG:5179) → score → cluster
//!      → representatives → convex hulls → map / summary / GeoJSON
//! ```
//!
//! # Scoring Scales
//!
//! | Distance (m) | Fine | Coarse |
//! |--------------|------|--------|
//! | ≤ 50         | 5    | 5      |
//! | ≤ 100        | 4    | 5      |
//! | ≤ 200        | 3    | 4      |
//! | ≤ 300        | 2    | 3      |
//! | ≤ 400        | 1    | 3      |
//! | ≤ 800        | 0    | 2      |
//! | > 800        | 0    | 1      |
//!
//! # Clustering Strategies
//!
//! - `PerSubdivision`: each subdivision (읍면동) is split in two by k-means;
//!   single-facility subdivisions become their own cluster.
//! - `Global { k }`: one k-means run over every facility.

use geo::Polygon;
use serde::Serialize;
use thiserror::Error;
use utmk_projection::{GeoPoint, PlanarPoint, ProjectionError};

pub mod boundary;
pub mod clusterer;
pub mod export;
pub mod kmeans;
pub mod loader;
pub mod pipeline;
pub mod render;
pub mod scorer;
pub mod selector;

pub use clusterer::ClusterStrategy;
pub use loader::ColumnNames;
pub use pipeline::{analyze, PipelineConfig};
pub use render::MapConfig;
pub use scorer::ScoreScale;

/// Sentinel for facilities without a subdivision ("no information")
pub const UNKNOWN_SUBDIVISION: &str = "정보없음";

/// Default cluster count for the global strategy
pub const DEFAULT_GLOBAL_K: usize = 15;

/// Sub-clusters per subdivision for the per-subdivision strategy
pub const SUBDIVISION_SPLIT: usize = 2;

/// Default k-means seed
pub const DEFAULT_SEED: u64 = 0;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),
    #[error("Required column '{0}' not found in header")]
    MissingColumn(String),
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
    #[error("Workbook has no worksheet named '{0}'")]
    MissingSheet(String),
    #[error("No usable facilities found")]
    NoFacilities,
    #[error("Cannot form {requested} clusters from {available} facilities")]
    InvalidClusterCount { requested: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, ClusterError>;

/// A facility row that survived loading, with its UTM-K position
#[derive(Debug, Clone, Serialize)]
pub struct Facility {
    /// 1-based source row (the header is row 1)
    pub row: usize,
    pub name: String,
    pub subdivision: String,
    pub longitude: f64,
    pub latitude: f64,
    /// UTM-K easting (m)
    pub x: f64,
    /// UTM-K northing (m)
    pub y: f64,
    /// Distance to the nearest bus stop (m)
    pub distance_m: f64,
}

impl Facility {
    pub fn geo(&self) -> GeoPoint {
        GeoPoint::new(self.longitude, self.latitude)
    }

    pub fn planar(&self) -> PlanarPoint {
        PlanarPoint::new(self.x, self.y)
    }
}

/// Facility with its access score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredFacility {
    pub facility: Facility,
    pub score: u8,
}

/// Facility with score and cluster assignment
#[derive(Debug, Clone, Serialize)]
pub struct AssignedFacility {
    pub facility: Facility,
    pub score: u8,
    pub cluster_id: usize,
    /// Planar distance to the assigned cluster's centroid (m)
    pub centroid_distance: f64,
}

/// A non-empty cluster with its representative
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub id: usize,
    /// Indices into `ClusterAnalysis::facilities`, in input order
    pub members: Vec<usize>,
    pub centroid: PlanarPoint,
    pub centroid_geo: GeoPoint,
    /// Index of the member nearest the centroid
    pub representative: usize,
    pub mean_score: f64,
    /// Convex hull of member lon/lat, absent for degenerate groups
    #[serde(skip)]
    pub boundary: Option<Polygon<f64>>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.binary_search(&index).is_ok()
    }
}

/// Outline of one subdivision
#[derive(Debug, Clone)]
pub struct SubdivisionBoundary {
    pub name: String,
    pub hull: Polygon<f64>,
    /// Mean of the hull vertices, used for the map label
    pub label: GeoPoint,
}

/// Full result of one run
#[derive(Debug, Clone)]
pub struct ClusterAnalysis {
    pub facilities: Vec<AssignedFacility>,
    pub clusters: Vec<Cluster>,
    pub subdivisions: Vec<SubdivisionBoundary>,
    pub config: PipelineConfig,
}

impl ClusterAnalysis {
    pub fn cluster(&self, id: usize) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    /// (min, max) facility score, `None` when there are no facilities
    pub fn score_range(&self) -> Option<(u8, u8)> {
        let min = self.facilities.iter().map(|f| f.score).min()?;
        let max = self.facilities.iter().map(|f| f.score).max()?;
        Some((min, max))
    }

    /// Mean lat/lon of all facilities, used to center the map
    pub fn center(&self) -> Option<GeoPoint> {
        if self.facilities.is_empty() {
            return None;
        }
        let n = self.facilities.len() as f64;
        let lon = self.facilities.iter().map(|f| f.facility.longitude).sum::<f64>() / n;
        let lat = self.facilities.iter().map(|f| f.facility.latitude).sum::<f64>() / n;
        Some(GeoPoint::new(lon, lat))
    }
}
