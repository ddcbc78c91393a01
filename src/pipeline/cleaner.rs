//! Cleaner
//! Derives growth rates, removes growth outliers and applies the year window.

use crate::config::PipelineConfig;
use crate::data::PanelRow;
use crate::pipeline::integrator::count_countries;
use crate::pipeline::report::CleaningReport;
use crate::stats::StatsCalculator;

/// Percentage change from `previous` to `current`; undefined on a zero base.
pub fn pct_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    match (previous, current) {
        (Some(prev), Some(cur)) if prev != 0.0 => Some((cur - prev) / prev * 100.0),
        _ => None,
    }
}

pub struct Cleaner<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Cleaner<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn clean(&self, rows: Vec<PanelRow>) -> (Vec<PanelRow>, CleaningReport) {
        let mut report = CleaningReport {
            rows_in: rows.len(),
            ..CleaningReport::default()
        };

        let mut rows = Self::compute_growth(rows);

        for column in &self.config.cleaning.outlier_columns {
            let (kept, removed) =
                Self::remove_outliers(rows, column, self.config.cleaning.iqr_multiplier);
            if removed > 0 {
                log::info!(
                    "{column}: removed {removed} extreme outliers (kept {}/{})",
                    kept.len(),
                    kept.len() + removed
                );
            }
            report.outliers_removed.insert(column.clone(), removed);
            rows = kept;
        }

        let before = rows.len();
        let rows = self.filter_years(rows);
        report.rows_dropped_year_window = before - rows.len();

        report.rows_out = rows.len();
        report.countries_out = count_countries(&rows);
        report.year_min = rows.iter().map(|r| r.year).min();
        report.year_max = rows.iter().map(|r| r.year).max();
        log::info!(
            "clean panel: {} rows, {} countries ({:?}-{:?})",
            report.rows_out,
            report.countries_out,
            report.year_min,
            report.year_max
        );

        (rows, report)
    }

    /// Sort by (country, year) and derive year-over-year growth.
    ///
    /// Growth at year `t` is only defined when the same country has a row
    /// for `t - 1`; a country's first year, or a year after a gap, is null.
    pub fn compute_growth(mut rows: Vec<PanelRow>) -> Vec<PanelRow> {
        rows.sort_by(|a, b| (&a.country_name, a.year).cmp(&(&b.country_name, b.year)));

        let mut out: Vec<PanelRow> = Vec::with_capacity(rows.len());
        for row in rows {
            let previous = out
                .last()
                .filter(|p| p.country_name == row.country_name && p.year + 1 == row.year);
            let ecom_sales_growth = previous
                .and_then(|p| pct_change(p.ecom_sales_usd_millions, row.ecom_sales_usd_millions));
            let internet_growth =
                previous.and_then(|p| pct_change(p.internet_users_pct, row.internet_users_pct));
            out.push(PanelRow {
                ecom_sales_growth,
                internet_growth,
                ..row
            });
        }
        out
    }

    /// Keep rows whose value in `column` is null or inside the inclusive
    /// `[Q1 - k*IQR, Q3 + k*IQR]` range. Returns the kept rows and the
    /// number removed.
    pub fn remove_outliers(
        rows: Vec<PanelRow>,
        column: &str,
        multiplier: f64,
    ) -> (Vec<PanelRow>, usize) {
        let values: Vec<f64> = rows.iter().filter_map(|r| r.growth(column)).collect();
        let Some((lower, upper)) = StatsCalculator::iqr_bounds(&values, multiplier) else {
            return (rows, 0);
        };

        let before = rows.len();
        let kept: Vec<PanelRow> = rows
            .into_iter()
            .filter(|r| match r.growth(column) {
                Some(v) => v >= lower && v <= upper,
                None => true,
            })
            .collect();
        let removed = before - kept.len();
        (kept, removed)
    }

    fn filter_years(&self, rows: Vec<PanelRow>) -> Vec<PanelRow> {
        let range = self.config.filters.year_min..=self.config.filters.year_max;
        rows.into_iter().filter(|r| range.contains(&r.year)).collect()
    }
}
