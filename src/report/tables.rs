//! Summary tables over the clean panel.

use crate::data::panel::{CONFLICT_DEATHS, ECOM_SALES, ECOM_SHARE, INTERNET_USERS};
use crate::data::PanelRow;
use crate::error::PipelineResult;
use crate::stats::{ColumnSummary, StatsCalculator};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Columns described in the summary statistics table.
pub const SUMMARY_COLUMNS: [&str; 4] = [ECOM_SALES, ECOM_SHARE, INTERNET_USERS, CONFLICT_DEATHS];

/// Mean of the present values, None when there are none.
pub fn mean_of(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.into_iter().flatten().collect();
    StatsCalculator::mean(&present)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn summary_statistics(rows: &[PanelRow]) -> Vec<ColumnSummary> {
    let columns: Vec<(String, Vec<f64>)> = SUMMARY_COLUMNS
        .iter()
        .map(|&name| {
            let values = rows.iter().filter_map(|r| r.measure(name)).collect();
            (name.to_string(), values)
        })
        .collect();
    StatsCalculator::compute_summaries_parallel(&columns)
}

/// `describe()` layout: one row per statistic, one column per variable.
pub fn summary_frame(summaries: &[ColumnSummary]) -> PipelineResult<DataFrame> {
    let stats = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];
    let mut columns = vec![Column::new("statistic".into(), stats.to_vec())];
    for s in summaries {
        let values = vec![
            s.count as f64,
            s.mean,
            s.std,
            s.min,
            s.p25,
            s.median,
            s.p75,
            s.max,
        ];
        columns.push(Column::new(s.name.as_str().into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionalRow {
    pub region: String,
    pub mean_sales: Option<f64>,
    pub mean_share: Option<f64>,
    pub mean_internet: Option<f64>,
    pub countries: usize,
}

/// Per-region means, rounded to two decimals, ordered by region name.
pub fn regional_comparison(rows: &[PanelRow]) -> Vec<RegionalRow> {
    let mut by_region: BTreeMap<&str, Vec<&PanelRow>> = BTreeMap::new();
    for row in rows {
        if let Some(region) = row.region.as_deref() {
            by_region.entry(region).or_default().push(row);
        }
    }

    by_region
        .into_iter()
        .map(|(region, members)| {
            let countries: BTreeSet<&str> =
                members.iter().map(|r| r.country_name.as_str()).collect();
            RegionalRow {
                region: region.to_string(),
                mean_sales: mean_of(members.iter().map(|r| r.ecom_sales_usd_millions))
                    .map(round2),
                mean_share: mean_of(members.iter().map(|r| r.ecom_share_pct)).map(round2),
                mean_internet: mean_of(members.iter().map(|r| r.internet_users_pct)).map(round2),
                countries: countries.len(),
            }
        })
        .collect()
}

pub fn regional_frame(rows: &[RegionalRow]) -> PipelineResult<DataFrame> {
    let df = DataFrame::new(vec![
        Column::new(
            "region".into(),
            rows.iter().map(|r| r.region.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_ecom_sales_usd_millions".into(),
            rows.iter().map(|r| r.mean_sales).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_ecom_share_pct".into(),
            rows.iter().map(|r| r.mean_share).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_internet_users_pct".into(),
            rows.iter().map(|r| r.mean_internet).collect::<Vec<_>>(),
        ),
        Column::new(
            "countries".into(),
            rows.iter().map(|r| r.countries as u64).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CovidImpactRow {
    pub covid_19_shock: bool,
    pub observations: usize,
    pub mean_sales_growth: Option<f64>,
    pub mean_share: Option<f64>,
}

/// Growth and share outside vs inside the pandemic window, rounded to two decimals.
pub fn covid_impact(rows: &[PanelRow]) -> Vec<CovidImpactRow> {
    [false, true]
        .into_iter()
        .filter_map(|shock| {
            let members: Vec<&PanelRow> =
                rows.iter().filter(|r| r.covid_19_shock == shock).collect();
            if members.is_empty() {
                return None;
            }
            Some(CovidImpactRow {
                covid_19_shock: shock,
                observations: members.len(),
                mean_sales_growth: mean_of(members.iter().map(|r| r.ecom_sales_growth))
                    .map(round2),
                mean_share: mean_of(members.iter().map(|r| r.ecom_share_pct)).map(round2),
            })
        })
        .collect()
}

pub fn covid_frame(rows: &[CovidImpactRow]) -> PipelineResult<DataFrame> {
    let df = DataFrame::new(vec![
        Column::new(
            "covid_19_shock".into(),
            rows.iter().map(|r| r.covid_19_shock).collect::<Vec<_>>(),
        ),
        Column::new(
            "observations".into(),
            rows.iter().map(|r| r.observations as u64).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_ecom_sales_growth".into(),
            rows.iter().map(|r| r.mean_sales_growth).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_ecom_share_pct".into(),
            rows.iter().map(|r| r.mean_share).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}
