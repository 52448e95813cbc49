//! Convex-hull outlines for clusters and subdivisions

use crate::{AssignedFacility, SubdivisionBoundary};
use geo::{Area, ConvexHull, MultiPoint, Point, Polygon};
use std::collections::BTreeMap;
use tracing::debug;
use utmk_projection::GeoPoint;

/// Hulls with area below this fraction of the squared extent are treated as
/// collinear.
const DEGENERATE_AREA_RATIO: f64 = 1e-12;

/// Convex hull of lon/lat points, `None` for fewer than three points or a
/// hull with no area.
pub fn convex_hull(points: &[GeoPoint]) -> Option<Polygon<f64>> {
    if points.len() < 3 {
        return None;
    }

    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.longitude);
        max_x = max_x.max(p.longitude);
        min_y = min_y.min(p.latitude);
        max_y = max_y.max(p.latitude);
    }
    let extent = (max_x - min_x).max(max_y - min_y);

    let multi_point = MultiPoint::new(
        points
            .iter()
            .map(|p| Point::new(p.longitude, p.latitude))
            .collect(),
    );
    let hull = multi_point.convex_hull();

    // A closed ring around a real polygon has at least four coordinates
    if hull.exterior().0.len() < 4
        || hull.unsigned_area() <= DEGENERATE_AREA_RATIO * extent * extent
    {
        return None;
    }

    Some(hull)
}

/// Mean of the hull's exterior coordinates (closing vertex included)
pub fn label_position(hull: &Polygon<f64>) -> Option<GeoPoint> {
    let coords = &hull.exterior().0;
    if coords.is_empty() {
        return None;
    }
    let n = coords.len() as f64;
    let lon = coords.iter().map(|c| c.x).sum::<f64>() / n;
    let lat = coords.iter().map(|c| c.y).sum::<f64>() / n;
    Some(GeoPoint::new(lon, lat))
}

/// Outline every subdivision that has a non-degenerate hull, in name order
pub fn subdivision_boundaries(facilities: &[AssignedFacility]) -> Vec<SubdivisionBoundary> {
    let mut groups: BTreeMap<&str, Vec<GeoPoint>> = BTreeMap::new();
    for f in facilities {
        groups
            .entry(f.facility.subdivision.as_str())
            .or_default()
            .push(f.facility.geo());
    }

    let mut boundaries = Vec::new();
    for (name, points) in groups {
        let Some(hull) = convex_hull(&points) else {
            debug!("No outline for subdivision {} ({} points)", name, points.len());
            continue;
        };
        let Some(label) = label_position(&hull) else {
            continue;
        };
        boundaries.push(SubdivisionBoundary {
            name: name.to_string(),
            hull,
            label,
        });
    }

    boundaries
}
