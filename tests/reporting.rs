mod common;

use common::Fixture;
use ecom_panel::pipeline;
use ecom_panel::Reporter;

const TABLES: [&str; 7] = [
    "summary_statistics.csv",
    "regional_comparison.csv",
    "covid_impact.csv",
    "development_comparison.csv",
    "resilience_factors.csv",
    "resilience_tests.csv",
    "conflict_analysis.csv",
];

#[test]
fn reporter_writes_every_table() {
    let fx = Fixture::new();
    let outcome = pipeline::run(&fx.config).unwrap();
    let out_dir = fx.dir.path().join("report");

    let files = Reporter::new(&fx.config, &outcome.panel)
        .write(&out_dir)
        .unwrap();

    assert_eq!(files.tables.len(), TABLES.len());
    for name in TABLES {
        assert!(out_dir.join(name).is_file(), "{name} missing");
    }
    assert!(files.charts.is_empty());
    assert!(!out_dir.join(&fx.config.output.charts_dir).exists());
}

#[test]
fn tables_built_from_a_reloaded_panel_match_the_in_memory_ones() {
    let fx = Fixture::new();
    let outcome = pipeline::run(&fx.config).unwrap();
    let reloaded = Reporter::load_panel(&outcome.panel_path).unwrap();
    assert_eq!(reloaded, outcome.panel);

    let direct = Reporter::new(&fx.config, &outcome.panel).build();
    let from_file = Reporter::new(&fx.config, &reloaded).build();
    assert_eq!(direct.regional, from_file.regional);
    assert_eq!(direct.covid, from_file.covid);
    assert_eq!(direct.conflict.high_conflict, from_file.conflict.high_conflict);
}

#[test]
fn regional_and_covid_tables_cover_the_panel() {
    let fx = Fixture::new();
    let panel = pipeline::run(&fx.config).unwrap().panel;
    let tables = Reporter::new(&fx.config, &panel).build();

    let regions: Vec<&str> = tables.regional.iter().map(|r| r.region.as_str()).collect();
    assert_eq!(
        regions,
        vec!["Europe & Central Asia", "North America", "Sub-Saharan Africa"]
    );
    assert_eq!(tables.regional[0].countries, 2);

    assert_eq!(tables.covid.len(), 2);
    assert_eq!(tables.covid[0].observations, 5);
    assert_eq!(tables.covid[1].observations, 6);
}

#[test]
fn research_tables_follow_the_pandemic_periods() {
    let fx = Fixture::new();
    let panel = pipeline::run(&fx.config).unwrap().panel;
    let tables = Reporter::new(&fx.config, &panel).build();

    let periods: Vec<&str> = tables.development.iter().map(|d| d.period).collect();
    assert_eq!(periods, vec!["Pre-pandemic", "Pandemic"]);

    let countries: Vec<&str> = tables
        .resilience
        .iter()
        .map(|r| r.country.as_str())
        .collect();
    assert_eq!(countries, vec!["Canada", "Malta", "Otherland", "Testland"]);

    assert!(tables.tests.len() >= 2);
    assert!(tables
        .tests
        .iter()
        .any(|t| t.test.contains("high vs low conflict")));
}

#[test]
fn conflict_split_uses_cumulative_deaths() {
    let fx = Fixture::new();
    let panel = pipeline::run(&fx.config).unwrap().panel;
    let conflict = Reporter::new(&fx.config, &panel).build().conflict;

    assert_eq!(conflict.high_conflict, vec!["Otherland".to_string()]);
    assert_eq!(conflict.groups[0].label, "High conflict");
    assert_eq!(conflict.groups[0].countries, 1);
    assert_eq!(conflict.groups[0].observations, 2);
    assert_eq!(conflict.groups[1].countries, 3);
    assert_eq!(conflict.groups[1].observations, 4);

    let mut fx = fx;
    fx.config.reporting.high_conflict_threshold = 110.0;
    let strict = Reporter::new(&fx.config, &panel).build().conflict;
    assert!(strict.high_conflict.is_empty());
}
