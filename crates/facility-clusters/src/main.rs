//! Facility Cluster Map CLI
//!
//! Scores facilities by bus-stop distance, clusters them and writes an
//! interactive map.
//!
//! Usage:
//!   cluster-map final_distance.xlsx --output Cluster_Map.html
//!   cluster-map final_distance.xlsx --strategy global -k 15 --scale coarse \
//!               --output Interactive_Layer_Map_.html --summary summary.json --geojson

use anyhow::Result;
use clap::{Parser, ValueEnum};
use facility_clusters::{
    analyze, export, loader, render, ClusterStrategy, ColumnNames, MapConfig, PipelineConfig,
    ScoreScale, DEFAULT_GLOBAL_K, DEFAULT_SEED,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utmk_projection::TransverseMercator;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Two sub-clusters per subdivision
    PerSubdivision,
    /// One k-means over all facilities
    Global,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScaleArg {
    /// 50/100/200/300/400 m → 5..0
    Fine,
    /// 100/200/400/800 m → 5..1
    Coarse,
}

#[derive(Parser, Debug)]
#[command(
    name = "cluster-map",
    about = "Cluster facilities by bus access and render an interactive map"
)]
struct Args {
    /// Facility table (.xlsx, .xls, .ods or .csv)
    #[arg(default_value = "final_distance.xlsx")]
    input: PathBuf,

    /// Worksheet name (defaults to the first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Output HTML map
    #[arg(short, long, default_value = "Cluster_Map.html")]
    output: PathBuf,

    /// Clustering strategy
    #[arg(long, value_enum, default_value_t = StrategyArg::PerSubdivision)]
    strategy: StrategyArg,

    /// Cluster count for the global strategy
    #[arg(short = 'k', long = "clusters", default_value_t = DEFAULT_GLOBAL_K)]
    clusters: usize,

    /// k-means seed
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// k-means restarts (best inertia wins)
    #[arg(long, default_value_t = 1)]
    n_init: usize,

    /// Distance scoring scale
    #[arg(long, value_enum, default_value_t = ScaleArg::Fine)]
    scale: ScaleArg,

    /// Write a JSON run summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Also write GeoJSON next to the map
    #[arg(long)]
    geojson: bool,

    /// Initial map zoom
    #[arg(long, default_value_t = 11)]
    zoom: u8,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("{}", "=".repeat(60));
    info!("Facility Access Cluster Map");
    info!("{}", "=".repeat(60));

    let config = PipelineConfig {
        strategy: match args.strategy {
            StrategyArg::PerSubdivision => ClusterStrategy::PerSubdivision,
            StrategyArg::Global => ClusterStrategy::Global { k: args.clusters },
        },
        scale: match args.scale {
            ScaleArg::Fine => ScoreScale::Fine,
            ScaleArg::Coarse => ScoreScale::Coarse,
        },
        seed: args.seed,
        n_init: args.n_init,
        ..PipelineConfig::default()
    };

    let projection = TransverseMercator::utm_k();
    let table = loader::load_facilities(
        &args.input,
        &ColumnNames::default(),
        args.sheet.as_deref(),
        &projection,
    )?;
    let (total_rows, skipped) = (table.total_rows, table.skipped);

    let analysis = analyze(table.facilities, &config, &projection)?;

    let map_config = MapConfig {
        zoom: args.zoom,
        ..MapConfig::default()
    };
    render::write_map(&analysis, &map_config, &args.output)?;

    if let Some(path) = &args.summary {
        let summary = export::RunSummary::new(&analysis, &args.input, total_rows, skipped);
        export::write_summary(&summary, path)?;
    }

    if args.geojson {
        export::write_geojson(&analysis, args.output.with_extension("geojson"))?;
    }

    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Facilities: {} ({} rows dropped)", analysis.facilities.len(), skipped);
    info!("Clusters: {}", analysis.clusters.len());
    for c in &analysis.clusters {
        let rep = &analysis.facilities[c.representative].facility;
        info!(
            "  cluster {:>3} | {:>4} members | {:.3} | {}",
            c.id + 1,
            c.len(),
            c.mean_score,
            rep.name
        );
    }
    info!("Map saved to {:?}", args.output);

    Ok(())
}
