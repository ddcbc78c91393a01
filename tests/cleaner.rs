mod common;

use common::find;
use ecom_panel::data::panel::{ECOM_SALES_GROWTH, INTERNET_GROWTH};
use ecom_panel::data::PanelRow;
use ecom_panel::pipeline::Cleaner;
use ecom_panel::PipelineConfig;

/// Flat sales from 2011 to 2016 followed by a fifty-fold jump.
fn spiking_country() -> Vec<PanelRow> {
    (2011..=2017)
        .map(|year| {
            let sales = if year == 2017 { 5000.0 } else { 100.0 };
            PanelRow::new("Spikeland".to_string(), year, Some(sales), Some(1.0))
        })
        .collect()
}

#[test]
fn clean_runs_growth_then_outliers_then_year_window() {
    let config = PipelineConfig::default();
    let (rows, report) = Cleaner::new(&config).clean(spiking_country());

    assert_eq!(report.rows_in, 7);
    assert_eq!(report.outliers_removed.get(ECOM_SALES_GROWTH), Some(&1));
    assert_eq!(report.rows_dropped_year_window, 1);
    assert_eq!(report.rows_out, 5);
    assert_eq!(report.countries_out, 1);
    assert_eq!(report.year_min, Some(2012));
    assert_eq!(report.year_max, Some(2016));

    assert!(find(&rows, "Spikeland", 2017).is_none());
    // 2012 growth was derived from the 2011 row before the window dropped it
    assert_eq!(
        find(&rows, "Spikeland", 2012).unwrap().ecom_sales_growth,
        Some(0.0)
    );
}

#[test]
fn every_configured_column_is_filtered_and_reported() {
    let mut config = PipelineConfig::default();
    config.cleaning.outlier_columns =
        vec![ECOM_SALES_GROWTH.to_string(), INTERNET_GROWTH.to_string()];
    let (_, report) = Cleaner::new(&config).clean(spiking_country());

    assert_eq!(report.outliers_removed.len(), 2);
    assert_eq!(report.outliers_removed.get(INTERNET_GROWTH), Some(&0));
}

#[test]
fn no_outlier_columns_keeps_every_row_in_the_window() {
    let mut config = PipelineConfig::default();
    config.cleaning.outlier_columns.clear();
    let (rows, report) = Cleaner::new(&config).clean(spiking_country());

    assert!(report.outliers_removed.is_empty());
    assert_eq!(rows.len(), 6);
    let spike = find(&rows, "Spikeland", 2017).unwrap();
    assert_eq!(spike.ecom_sales_growth, Some(4900.0));
}

#[test]
fn cleaning_is_idempotent_on_its_own_output() {
    let config = PipelineConfig::default();
    let cleaner = Cleaner::new(&config);
    let input = spiking_country()[1..6].to_vec();
    let (once, _) = cleaner.clean(input);
    let (twice, report) = cleaner.clean(once.clone());

    assert_eq!(once, twice);
    assert_eq!(report.outliers_removed.get(ECOM_SALES_GROWTH), Some(&0));
}

#[test]
fn a_missing_sales_year_only_nulls_its_own_growth_and_the_next() {
    let rows: Vec<PanelRow> = [Some(10.0), None, Some(12.0), Some(13.0)]
        .into_iter()
        .zip(2015..)
        .map(|(sales, year)| PanelRow::new("Gapland".to_string(), year, sales, Some(1.0)))
        .collect();

    let grown = Cleaner::compute_growth(rows);
    let growth: Vec<Option<f64>> = grown.iter().map(|r| r.ecom_sales_growth).collect();
    assert!(growth[..3].iter().all(Option::is_none));
    assert!((growth[3].unwrap() - 100.0 / 12.0).abs() < 1e-9);

    let (kept, removed) = Cleaner::remove_outliers(grown, ECOM_SALES_GROWTH, 3.0);
    assert_eq!(removed, 0);
    assert_eq!(kept.len(), 4);
}
