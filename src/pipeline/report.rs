//! Stage reports.
//!
//! Every row a stage drops or fills is counted here, so a run can be audited
//! from the JSON written next to the panel.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    /// Rows excluded per source because a field failed type coercion.
    pub malformed_rows: BTreeMap<String, usize>,
    pub integration: IntegrationReport,
    pub cleaning: CleaningReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntegrationReport {
    pub ecommerce_rows: usize,
    pub segment_rows: usize,
    pub country_years_aggregated: usize,
    pub monthly_override: OverrideOutcome,
    /// Country names with no classification entry.
    pub classification_misses: Vec<String>,
    pub rows_without_internet: usize,
    pub rows_dropped_excluded_region: usize,
    pub rows_dropped_unclassified: usize,
    pub rows_dropped_excluded_territory: usize,
    pub region_corrections_applied: usize,
    pub rows_dropped_min_coverage: usize,
    pub countries_dropped_min_coverage: Vec<String>,
    pub conflict: ConflictOutcome,
    pub rows_out: usize,
    pub countries_out: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverrideOutcome {
    pub applied: bool,
    /// Why the override was skipped, when it was.
    pub absent_reason: Option<String>,
    pub country: String,
    pub years: Vec<i32>,
    pub replaced_rows: usize,
    pub months_joined: usize,
    /// Months present in only one of the two series, or with a missing value.
    pub months_unmatched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConflictOutcome {
    pub available: bool,
    pub absent_reason: Option<String>,
    pub events: usize,
    pub country_years: usize,
    pub rows_matched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub rows_in: usize,
    /// Column name -> rows removed by the IQR filter.
    pub outliers_removed: BTreeMap<String, usize>,
    pub rows_dropped_year_window: usize,
    pub rows_out: usize,
    pub countries_out: usize,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
}
