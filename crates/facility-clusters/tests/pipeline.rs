use facility_clusters::{
    analyze, export, loader, render, ClusterStrategy, ColumnNames, MapConfig, PipelineConfig,
    ScoreScale, UNKNOWN_SUBDIVISION,
};
use std::io::Write;
use utmk_projection::TransverseMercator;

const TABLE: &str = "\
시설명,읍면동,longitude,latitude,real_distance(m)
Jangheung Hall,Jangheung-myeon,126.95,37.72,35
Ilyeong Hall,Jangheung-myeon,126.96,37.73,180
Samsang Hall,Jangheung-myeon,126.97,37.71,420
Gyohyeon Hall,Jangheung-myeon,127.05,37.76,95
Seokhyeon Hall,Jangheung-myeon,127.06,37.77,310
Buheung Hall,Jangheung-myeon,127.07,37.75,810
Gwangjeok Hall,Gwangjeok-myeon,127.03,37.82,60
Ubong Hall,Gwangjeok-myeon,127.04,37.83,260
Hyochon Hall,Gwangjeok-myeon,127.02,37.84,1200
Gaun Hall,,127.10,37.70,150
Broken Hall,Gwangjeok-myeon,,37.80,10
No Distance Hall,Gwangjeok-myeon,127.01,37.80,
";

fn write_table() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(TABLE.as_bytes()).unwrap();
    file
}

#[test]
fn per_subdivision_run_end_to_end() {
    let input = write_table();
    let projection = TransverseMercator::utm_k();
    let table =
        loader::load_facilities(input.path(), &ColumnNames::default(), None, &projection).unwrap();
    assert_eq!(table.total_rows, 12);
    assert_eq!(table.skipped, 2);

    let analysis = analyze(table.facilities, &PipelineConfig::default(), &projection).unwrap();

    // Gwangjeok-myeon -> 0,1 ; Jangheung-myeon -> 2,3 ; 정보없음 -> 4
    let unknown = analysis
        .facilities
        .iter()
        .find(|f| f.facility.subdivision == UNKNOWN_SUBDIVISION)
        .unwrap();
    assert_eq!(unknown.cluster_id, 4);
    assert!(analysis.clusters.iter().all(|c| c.id <= 4));

    for (i, f) in analysis.facilities.iter().enumerate() {
        let cluster = analysis.cluster(f.cluster_id).unwrap();
        assert!(cluster.contains(i));
    }
    for c in &analysis.clusters {
        assert!(c.contains(c.representative));
    }

    let dir = tempfile::tempdir().unwrap();
    let map_path = dir.path().join("Cluster_Map.html");
    render::write_map(&analysis, &MapConfig::default(), &map_path).unwrap();
    let html = std::fs::read_to_string(&map_path).unwrap();
    assert!(html.contains("Jangheung Hall"));
    assert!(html.contains("L.control.layers"));

    let summary = export::RunSummary::new(&analysis, input.path(), table.total_rows, table.skipped);
    assert_eq!(summary.facility_count, 10);
    assert_eq!(summary.skipped_rows, 2);
}

#[test]
fn global_run_is_reproducible() {
    let input = write_table();
    let projection = TransverseMercator::utm_k();
    let config = PipelineConfig {
        strategy: ClusterStrategy::Global { k: 4 },
        scale: ScoreScale::Coarse,
        seed: 3,
        ..PipelineConfig::default()
    };

    let run = || {
        let table =
            loader::load_facilities(input.path(), &ColumnNames::default(), None, &projection)
                .unwrap();
        analyze(table.facilities, &config, &projection).unwrap()
    };
    let a = run();
    let b = run();

    let labels = |x: &facility_clusters::ClusterAnalysis| {
        x.facilities.iter().map(|f| f.cluster_id).collect::<Vec<_>>()
    };
    let reps = |x: &facility_clusters::ClusterAnalysis| {
        x.clusters.iter().map(|c| c.representative).collect::<Vec<_>>()
    };
    assert_eq!(labels(&a), labels(&b));
    assert_eq!(reps(&a), reps(&b));

    // Coarse scale never drops below 1
    assert!(a.facilities.iter().all(|f| f.score >= 1));
    let hyochon = a
        .facilities
        .iter()
        .find(|f| f.facility.name == "Hyochon Hall")
        .unwrap();
    assert_eq!(hyochon.score, 1);
}

#[test]
fn global_k_larger_than_input_fails() {
    let input = write_table();
    let projection = TransverseMercator::utm_k();
    let table =
        loader::load_facilities(input.path(), &ColumnNames::default(), None, &projection).unwrap();
    let config = PipelineConfig {
        strategy: ClusterStrategy::Global { k: 15 },
        ..PipelineConfig::default()
    };
    assert!(analyze(table.facilities, &config, &projection).is_err());
}
