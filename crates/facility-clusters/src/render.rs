//! Leaflet map rendering
//!
//! Produces one standalone HTML document: Leaflet is pulled from its CDN,
//! the data, styling and script are inline.

use crate::{ClusterAnalysis, ClusterStrategy, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Cluster stroke colors, cycled by cluster id
pub const CLUSTER_PALETTE: [&str; 30] = [
    "#e6194B", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
    "#bcf60c", "#fabebe", "#008080", "#e6beff", "#9A6324", "#fffac8", "#800000", "#aaffc3",
    "#808000", "#ffd8b1", "#000075", "#808080", "#ffffff", "#000000", "#a9a9a9", "#dda0dd",
    "#ff69b4", "#cd5c5c", "#20b2aa", "#ff6347", "#adff2f", "#6495ed",
];

/// Score ramp stops: red → yellow → green
pub const RAMP_STOPS: [(u8, u8, u8); 3] = [(255, 0, 0), (255, 255, 0), (0, 128, 0)];

pub const CARTO_POSITRON_URL: &str =
    "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png";
pub const CARTO_ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors &copy; <a href=\"https://carto.com/attributions\">CARTO</a>";

pub fn cluster_color(id: usize) -> &'static str {
    CLUSTER_PALETTE[id % CLUSTER_PALETTE.len()]
}

/// Map appearance
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub title: String,
    pub zoom: u8,
    pub tiles_url: String,
    pub tiles_attribution: String,
    /// Legend caption for the score ramp
    pub caption: String,
    /// Overrides the strategy-based default for the subdivision overlay
    pub show_subdivisions: Option<bool>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            title: "Facility clusters".to_string(),
            zoom: 11,
            tiles_url: CARTO_POSITRON_URL.to_string(),
            tiles_attribution: CARTO_ATTRIBUTION.to_string(),
            caption: "Bus infrastructure score".to_string(),
            show_subdivisions: None,
        }
    }
}

/// Linear color ramp over `[min, max]`
#[derive(Debug, Clone, Copy)]
pub struct ScoreRamp {
    pub min: f64,
    pub max: f64,
}

impl ScoreRamp {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Hex color for `value`; a zero-width range maps to the top stop
    pub fn color(&self, value: f64) -> String {
        let t = if self.max > self.min {
            ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let segments = (RAMP_STOPS.len() - 1) as f64;
        let pos = t * segments;
        let idx = (pos.floor() as usize).min(RAMP_STOPS.len() - 2);
        let local = pos - idx as f64;

        let (r0, g0, b0) = RAMP_STOPS[idx];
        let (r1, g1, b1) = RAMP_STOPS[idx + 1];
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * local).round() as u8;

        format!("#{:02x}{:02x}{:02x}", lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
    }

    /// CSS colors of the stops, low to high
    pub fn stops(&self) -> Vec<String> {
        RAMP_STOPS
            .iter()
            .map(|(r, g, b)| format!("#{:02x}{:02x}{:02x}", r, g, b))
            .collect()
    }
}

/// Escape text for popups and tooltips
pub fn escape_html(text: &str) -> String {
    html_escape::encode_safe(text).into_owned()
}

#[derive(Serialize)]
struct Tiles<'a> {
    url: &'a str,
    attribution: &'a str,
}

#[derive(Serialize)]
struct FacilityMarker {
    lat: f64,
    lon: f64,
    color: &'static str,
    fill: String,
    popup: String,
    tooltip: String,
}

#[derive(Serialize)]
struct RepresentativeMarker {
    lat: f64,
    lon: f64,
    popup: String,
}

#[derive(Serialize)]
struct Outline {
    /// [lat, lon] pairs
    ring: Vec<[f64; 2]>,
    color: &'static str,
    popup: String,
}

#[derive(Serialize)]
struct SubdivisionOutline {
    ring: Vec<[f64; 2]>,
    label: [f64; 2],
    name: String,
}

#[derive(Serialize)]
struct Legend {
    caption: String,
    min: f64,
    max: f64,
    stops: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MapData<'a> {
    center: [f64; 2],
    zoom: u8,
    tiles: Tiles<'a>,
    facilities: Vec<FacilityMarker>,
    representatives: Vec<RepresentativeMarker>,
    clusters: Vec<Outline>,
    subdivisions: Vec<SubdivisionOutline>,
    legend: Legend,
    show_subdivisions: bool,
}

fn ring(polygon: &geo::Polygon<f64>) -> Vec<[f64; 2]> {
    polygon.exterior().0.iter().map(|c| [c.y, c.x]).collect()
}

fn map_data<'a>(analysis: &ClusterAnalysis, config: &'a MapConfig) -> MapData<'a> {
    let (min, max) = analysis
        .score_range()
        .map(|(lo, hi)| (lo as f64, hi as f64))
        .unwrap_or((0.0, 0.0));
    let ramp = ScoreRamp::new(min, max);

    let facilities = analysis
        .facilities
        .iter()
        .map(|f| FacilityMarker {
            lat: f.facility.latitude,
            lon: f.facility.longitude,
            color: cluster_color(f.cluster_id),
            fill: ramp.color(f.score as f64),
            popup: format!(
                "<b>Facility:</b> {}<br><b>Subdivision:</b> {}<br><b>real_distance:</b> {:.1} m<br><b>Score:</b> {}<br><b>Cluster:</b> {}",
                escape_html(&f.facility.name),
                escape_html(&f.facility.subdivision),
                f.facility.distance_m,
                f.score,
                f.cluster_id + 1
            ),
            tooltip: escape_html(&f.facility.name),
        })
        .collect();

    let representatives = analysis
        .clusters
        .iter()
        .map(|c| {
            let rep = &analysis.facilities[c.representative];
            RepresentativeMarker {
                lat: rep.facility.latitude,
                lon: rep.facility.longitude,
                popup: format!(
                    "<b>Representative facility &#9733;</b><br>Facility: {}<br>Cluster: {}<br>{}: {:.3}",
                    escape_html(&rep.facility.name),
                    c.id + 1,
                    escape_html(&config.caption),
                    c.mean_score
                ),
            }
        })
        .collect();

    let clusters = analysis
        .clusters
        .iter()
        .filter_map(|c| {
            c.boundary.as_ref().map(|hull| Outline {
                ring: ring(hull),
                color: cluster_color(c.id),
                popup: format!("Cluster {}", c.id + 1),
            })
        })
        .collect();

    let subdivisions = analysis
        .subdivisions
        .iter()
        .map(|s| SubdivisionOutline {
            ring: ring(&s.hull),
            label: [s.label.latitude, s.label.longitude],
            name: escape_html(&s.name),
        })
        .collect();

    let center = analysis
        .center()
        .map(|c| [c.latitude, c.longitude])
        .unwrap_or([0.0, 0.0]);

    let ramp_stops = ramp.stops();
    MapData {
        center,
        zoom: config.zoom,
        tiles: Tiles {
            url: &config.tiles_url,
            attribution: &config.tiles_attribution,
        },
        facilities,
        representatives,
        clusters,
        subdivisions,
        legend: Legend {
            caption: escape_html(&config.caption),
            min,
            max,
            stops: ramp_stops,
        },
        show_subdivisions: config.show_subdivisions.unwrap_or(matches!(
            analysis.config.strategy,
            ClusterStrategy::PerSubdivision
        )),
    }
}

/// Render the analysis as a standalone HTML document
pub fn render_map(analysis: &ClusterAnalysis, config: &MapConfig) -> Result<String> {
    let data = map_data(analysis, config);
    // Keep `</script>` out of the inline JSON
    let json = serde_json::to_string(&data)?.replace("</", "<\\/");

    Ok(MAP_TEMPLATE
        .replace("__TITLE__", &escape_html(&config.title))
        .replace("__MAP_DATA__", &json))
}

/// Render and write the map to `path`
pub fn write_map(
    analysis: &ClusterAnalysis,
    config: &MapConfig,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let html = render_map(analysis, config)?;

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(html.as_bytes())?;
    writer.flush()?;

    info!("Wrote map ({} bytes) to {:?}", html.len(), path);
    Ok(())
}

const MAP_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>__TITLE__</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" crossorigin="" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js" crossorigin=""></script>
  <style>
    html, body { height: 100%; margin: 0; }
    #map { position: absolute; inset: 0; }
    .rep-icon {
      color: #ffd700;
      background: #111;
      border: 2px solid #fff;
      border-radius: 50%;
      font-size: 15px;
      line-height: 20px;
      text-align: center;
      box-shadow: 0 0 4px rgba(0, 0, 0, 0.6);
    }
    .subdivision-label div {
      font-size: 12pt;
      font-weight: bold;
      color: black;
      white-space: nowrap;
    }
    .score-legend {
      background: rgba(255, 255, 255, 0.9);
      padding: 6px 10px;
      border-radius: 4px;
      font: 12px sans-serif;
      box-shadow: 0 0 6px rgba(0, 0, 0, 0.3);
    }
    .score-legend .bar { width: 200px; height: 10px; margin: 4px 0; }
    .score-legend .ticks { display: flex; justify-content: space-between; }
  </style>
</head>
<body>
  <div id="map"></div>
  <script>
    const data = __MAP_DATA__;

    const map = L.map('map').setView(data.center, data.zoom);
    L.tileLayer(data.tiles.url, {
      attribution: data.tiles.attribution,
      subdomains: 'abcd',
      maxZoom: 20
    }).addTo(map);

    const subdivisionLayer = L.layerGroup();
    data.subdivisions.forEach(s => {
      L.polyline(s.ring, { color: 'black', weight: 2.7 }).bindPopup(s.name).addTo(subdivisionLayer);
      L.marker(s.label, {
        icon: L.divIcon({ className: 'subdivision-label', html: '<div>' + s.name + '</div>', iconSize: null }),
        interactive: false
      }).addTo(subdivisionLayer);
    });

    const clusterLayer = L.layerGroup();
    data.clusters.forEach(c => {
      L.polygon(c.ring, {
        color: c.color,
        fillColor: c.color,
        weight: 2,
        fillOpacity: 0.15,
        interactive: false
      }).addTo(clusterLayer);
    });

    const facilityLayer = L.layerGroup();
    data.facilities.forEach(f => {
      L.circleMarker([f.lat, f.lon], {
        radius: 6,
        color: f.color,
        fill: true,
        fillColor: f.fill,
        fillOpacity: 0.8
      }).bindPopup(f.popup, { maxWidth: 250 }).bindTooltip(f.tooltip).addTo(facilityLayer);
    });

    const representativeLayer = L.layerGroup();
    data.representatives.forEach(r => {
      L.marker([r.lat, r.lon], {
        icon: L.divIcon({ className: 'rep-icon', html: '&#9733;', iconSize: [24, 24] })
      }).bindPopup(r.popup, { maxWidth: 250 }).addTo(representativeLayer);
    });

    if (data.showSubdivisions) { subdivisionLayer.addTo(map); }
    clusterLayer.addTo(map);
    facilityLayer.addTo(map);
    representativeLayer.addTo(map);

    const legend = L.control({ position: 'topright' });
    legend.onAdd = function () {
      const div = L.DomUtil.create('div', 'score-legend');
      div.innerHTML =
        '<div>' + data.legend.caption + '</div>' +
        '<div class="bar" style="background: linear-gradient(to right, ' + data.legend.stops.join(', ') + ')"></div>' +
        '<div class="ticks"><span>' + data.legend.min + '</span><span>' + data.legend.max + '</span></div>';
      return div;
    };
    legend.addTo(map);

    L.control.layers(null, {
      'Subdivision boundaries': subdivisionLayer,
      'Cluster boundaries': clusterLayer,
      'Facilities': facilityLayer,
      'Representatives': representativeLayer
    }, { collapsed: false }).addTo(map);
  </script>
</body>
</html>
"#;
