//! Research-question tables
//!
//! 1. Did developed and developing economies diverge across the pandemic?
//! 2. Which country traits go with a larger pandemic jump in e-commerce share?
//! 3. Did high-conflict countries fare differently during the pandemic?

use crate::config::PipelineConfig;
use crate::data::PanelRow;
use crate::error::PipelineResult;
use crate::report::tables::mean_of;
use crate::stats::{StatsCalculator, TTest, SIGNIFICANCE_THRESHOLD};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub label: &'static str,
    pub start: i32,
    pub end: i32,
}

impl Period {
    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

/// Pre-pandemic, pandemic and post-pandemic spans over the panel's years.
/// Spans with no years are left out.
pub fn periods(rows: &[PanelRow], config: &PipelineConfig) -> Vec<Period> {
    let (Some(first), Some(last)) = (
        rows.iter().map(|r| r.year).min(),
        rows.iter().map(|r| r.year).max(),
    ) else {
        return Vec::new();
    };
    let shocks = &config.shocks;
    [
        Period {
            label: "Pre-pandemic",
            start: first,
            end: shocks.pandemic_start - 1,
        },
        Period {
            label: "Pandemic",
            start: shocks.pandemic_start,
            end: shocks.pandemic_end,
        },
        Period {
            label: "Post-pandemic",
            start: shocks.pandemic_end + 1,
            end: last,
        },
    ]
    .into_iter()
    .filter(|p| p.start <= p.end)
    .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DevelopmentRow {
    pub period: &'static str,
    pub start: i32,
    pub end: i32,
    pub developed_share: Option<f64>,
    pub developing_share: Option<f64>,
    pub developed_growth: Option<f64>,
    pub developing_growth: Option<f64>,
}

impl DevelopmentRow {
    pub fn share_gap(&self) -> Option<f64> {
        Some(self.developed_share? - self.developing_share?)
    }

    pub fn growth_gap(&self) -> Option<f64> {
        Some(self.developed_growth? - self.developing_growth?)
    }
}

fn in_groups(row: &PanelRow, groups: &[String]) -> bool {
    row.income_group
        .as_deref()
        .is_some_and(|g| groups.iter().any(|x| x == g))
}

pub fn development_comparison(rows: &[PanelRow], config: &PipelineConfig) -> Vec<DevelopmentRow> {
    let reporting = &config.reporting;
    periods(rows, config)
        .into_iter()
        .map(|period| {
            let in_period: Vec<&PanelRow> =
                rows.iter().filter(|r| period.contains(r.year)).collect();
            let developed: Vec<&PanelRow> = in_period
                .iter()
                .copied()
                .filter(|r| in_groups(r, &reporting.developed_income_groups))
                .collect();
            let developing: Vec<&PanelRow> = in_period
                .iter()
                .copied()
                .filter(|r| in_groups(r, &reporting.developing_income_groups))
                .collect();
            DevelopmentRow {
                period: period.label,
                start: period.start,
                end: period.end,
                developed_share: mean_of(developed.iter().map(|r| r.ecom_share_pct)),
                developing_share: mean_of(developing.iter().map(|r| r.ecom_share_pct)),
                developed_growth: mean_of(developed.iter().map(|r| r.ecom_sales_growth)),
                developing_growth: mean_of(developing.iter().map(|r| r.ecom_sales_growth)),
            }
        })
        .collect()
}

pub fn development_frame(rows: &[DevelopmentRow]) -> PipelineResult<DataFrame> {
    let df = DataFrame::new(vec![
        Column::new(
            "period".into(),
            rows.iter().map(|r| r.period).collect::<Vec<_>>(),
        ),
        Column::new(
            "start_year".into(),
            rows.iter().map(|r| r.start).collect::<Vec<_>>(),
        ),
        Column::new(
            "end_year".into(),
            rows.iter().map(|r| r.end).collect::<Vec<_>>(),
        ),
        Column::new(
            "developed_share_pct".into(),
            rows.iter().map(|r| r.developed_share).collect::<Vec<_>>(),
        ),
        Column::new(
            "developing_share_pct".into(),
            rows.iter().map(|r| r.developing_share).collect::<Vec<_>>(),
        ),
        Column::new(
            "share_gap".into(),
            rows.iter().map(DevelopmentRow::share_gap).collect::<Vec<_>>(),
        ),
        Column::new(
            "developed_sales_growth".into(),
            rows.iter().map(|r| r.developed_growth).collect::<Vec<_>>(),
        ),
        Column::new(
            "developing_sales_growth".into(),
            rows.iter().map(|r| r.developing_growth).collect::<Vec<_>>(),
        ),
        Column::new(
            "growth_gap".into(),
            rows.iter().map(DevelopmentRow::growth_gap).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceRow {
    pub country: String,
    pub income_group: Option<String>,
    pub region: Option<String>,
    pub baseline_share: f64,
    pub pandemic_share: f64,
    pub mean_internet: Option<f64>,
}

impl ResilienceRow {
    pub fn share_change(&self) -> f64 {
        self.pandemic_share - self.baseline_share
    }
}

/// Countries with a share observation both in the baseline years
/// (`baseline_start` up to the pandemic) and inside the pandemic window.
pub fn resilience_factors(rows: &[PanelRow], config: &PipelineConfig) -> Vec<ResilienceRow> {
    let shocks = &config.shocks;
    let baseline = config.reporting.baseline_start..shocks.pandemic_start;

    let mut by_country: BTreeMap<&str, Vec<&PanelRow>> = BTreeMap::new();
    for row in rows {
        by_country.entry(row.country_name.as_str()).or_default().push(row);
    }

    by_country
        .into_iter()
        .filter_map(|(country, members)| {
            let baseline_share = mean_of(
                members
                    .iter()
                    .filter(|r| baseline.contains(&r.year))
                    .map(|r| r.ecom_share_pct),
            )?;
            let pandemic_share = mean_of(
                members
                    .iter()
                    .filter(|r| shocks.is_pandemic(r.year))
                    .map(|r| r.ecom_share_pct),
            )?;
            let first = members.first()?;
            Some(ResilienceRow {
                country: country.to_string(),
                income_group: first.income_group.clone(),
                region: first.region.clone(),
                baseline_share,
                pandemic_share,
                mean_internet: mean_of(members.iter().map(|r| r.internet_users_pct)),
            })
        })
        .collect()
}

pub fn resilience_frame(rows: &[ResilienceRow]) -> PipelineResult<DataFrame> {
    let df = DataFrame::new(vec![
        Column::new(
            "country_name".into(),
            rows.iter().map(|r| r.country.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "income_group".into(),
            rows.iter().map(|r| r.income_group.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "region".into(),
            rows.iter().map(|r| r.region.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "baseline_share_pct".into(),
            rows.iter().map(|r| r.baseline_share).collect::<Vec<_>>(),
        ),
        Column::new(
            "pandemic_share_pct".into(),
            rows.iter().map(|r| r.pandemic_share).collect::<Vec<_>>(),
        ),
        Column::new(
            "share_change".into(),
            rows.iter().map(ResilienceRow::share_change).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_internet_users_pct".into(),
            rows.iter().map(|r| r.mean_internet).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

/// One line of the statistical tests table.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub test: String,
    pub statistic: f64,
    pub p_value: f64,
    pub n: usize,
    pub significant: bool,
}

impl TestResult {
    fn from_ttest(test: &str, result: TTest, n: usize) -> Self {
        Self {
            test: test.to_string(),
            statistic: result.t_statistic,
            p_value: result.p_value,
            n,
            significant: result.is_significant,
        }
    }
}

/// Pooled-variance t-test unless the configuration asks for Welch's.
fn two_sample_test(label: &str, a: &[f64], b: &[f64], config: &PipelineConfig) -> TestResult {
    let (result, kind) = if config.reporting.equal_variance {
        (StatsCalculator::perform_pooled_ttest(a, b), "Student t")
    } else {
        (StatsCalculator::perform_ttest(a, b), "Welch t")
    };
    TestResult::from_ttest(&format!("{label} ({kind})"), result, a.len() + b.len())
}

/// Share change of developed vs other economies, and share change against
/// internet penetration.
pub fn resilience_tests(rows: &[ResilienceRow], config: &PipelineConfig) -> Vec<TestResult> {
    let developed = &config.reporting.developed_income_groups;
    let (high, other): (Vec<&ResilienceRow>, Vec<&ResilienceRow>) = rows.iter().partition(|r| {
        r.income_group
            .as_deref()
            .is_some_and(|g| developed.iter().any(|x| x == g))
    });
    let high: Vec<f64> = high.iter().map(|r| r.share_change()).collect();
    let other: Vec<f64> = other.iter().map(|r| r.share_change()).collect();

    let mut tests = vec![two_sample_test(
        "share_change: developed vs other",
        &high,
        &other,
        config,
    )];

    let pairs: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|r| Some((r.mean_internet?, r.share_change())))
        .collect();
    match StatsCalculator::pearson_test(&pairs) {
        Some(c) => tests.push(TestResult {
            test: "share_change ~ internet_users_pct (Pearson r)".to_string(),
            statistic: c.r,
            p_value: c.p_value,
            n: c.n,
            significant: c.p_value <= SIGNIFICANCE_THRESHOLD,
        }),
        None => log::warn!(
            "internet/share correlation undefined over {} countries",
            pairs.len()
        ),
    }

    for t in &tests {
        log::info!(
            "{}: statistic={:.3} p={:.4} n={}",
            t.test,
            t.statistic,
            t.p_value,
            t.n
        );
    }
    tests
}

pub fn tests_frame(rows: &[TestResult]) -> PipelineResult<DataFrame> {
    let df = DataFrame::new(vec![
        Column::new(
            "test".into(),
            rows.iter().map(|r| r.test.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "statistic".into(),
            rows.iter().map(|r| r.statistic).collect::<Vec<_>>(),
        ),
        Column::new(
            "p_value".into(),
            rows.iter().map(|r| r.p_value).collect::<Vec<_>>(),
        ),
        Column::new(
            "n".into(),
            rows.iter().map(|r| r.n as u64).collect::<Vec<_>>(),
        ),
        Column::new(
            "significant".into(),
            rows.iter().map(|r| r.significant).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictGroup {
    pub label: &'static str,
    pub countries: usize,
    pub observations: usize,
    pub mean_share: Option<f64>,
    pub mean_growth: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ConflictAnalysis {
    /// Countries whose cumulative conflict deaths exceed the threshold.
    pub high_conflict: Vec<String>,
    pub groups: Vec<ConflictGroup>,
    pub share_test: TestResult,
}

/// Compare high- and low-conflict countries inside the pandemic window.
pub fn conflict_analysis(rows: &[PanelRow], config: &PipelineConfig) -> ConflictAnalysis {
    let threshold = config.reporting.high_conflict_threshold;

    let mut deaths: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows {
        *deaths.entry(row.country_name.as_str()).or_default() += row.conflict_deaths;
    }
    let high_conflict: Vec<String> = deaths
        .iter()
        .filter(|(_, total)| **total > threshold)
        .map(|(country, _)| country.to_string())
        .collect();
    log::info!(
        "{} of {} countries above {threshold} cumulative conflict deaths",
        high_conflict.len(),
        deaths.len()
    );

    let pandemic: Vec<&PanelRow> = rows
        .iter()
        .filter(|r| config.shocks.is_pandemic(r.year))
        .collect();
    let (high_rows, low_rows): (Vec<&PanelRow>, Vec<&PanelRow>) = pandemic
        .into_iter()
        .partition(|r| high_conflict.binary_search(&r.country_name).is_ok());

    let group = |label: &'static str, members: &[&PanelRow]| {
        let countries: BTreeSet<&str> = members.iter().map(|r| r.country_name.as_str()).collect();
        ConflictGroup {
            label,
            countries: countries.len(),
            observations: members.len(),
            mean_share: mean_of(members.iter().map(|r| r.ecom_share_pct)),
            mean_growth: mean_of(members.iter().map(|r| r.ecom_sales_growth)),
        }
    };
    let groups = vec![
        group("High conflict", &high_rows[..]),
        group("Low conflict", &low_rows[..]),
    ];

    let high_share: Vec<f64> = high_rows.iter().filter_map(|r| r.ecom_share_pct).collect();
    let low_share: Vec<f64> = low_rows.iter().filter_map(|r| r.ecom_share_pct).collect();
    let share_test = two_sample_test(
        "pandemic share: high vs low conflict",
        &high_share,
        &low_share,
        config,
    );
    log::info!(
        "{}: statistic={:.3} p={:.4}",
        share_test.test,
        share_test.statistic,
        share_test.p_value
    );

    ConflictAnalysis {
        high_conflict,
        groups,
        share_test,
    }
}

pub fn conflict_frame(analysis: &ConflictAnalysis) -> PipelineResult<DataFrame> {
    let groups = &analysis.groups;
    let df = DataFrame::new(vec![
        Column::new(
            "group".into(),
            groups.iter().map(|g| g.label).collect::<Vec<_>>(),
        ),
        Column::new(
            "countries".into(),
            groups.iter().map(|g| g.countries as u64).collect::<Vec<_>>(),
        ),
        Column::new(
            "observations".into(),
            groups.iter().map(|g| g.observations as u64).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_ecom_share_pct".into(),
            groups.iter().map(|g| g.mean_share).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_ecom_sales_growth".into(),
            groups.iter().map(|g| g.mean_growth).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(country: &str, income: &str, year: i32, share: f64) -> PanelRow {
        let mut r = PanelRow::new(country.to_string(), year, Some(1.0), Some(share));
        r.income_group = Some(income.to_string());
        r
    }

    #[test]
    fn periods_follow_the_pandemic_window() {
        let config = PipelineConfig::default();
        let rows = vec![row("A", "High income", 2015, 1.0), row("A", "High income", 2024, 1.0)];
        let spans: Vec<(&str, i32, i32)> = periods(&rows, &config)
            .iter()
            .map(|p| (p.label, p.start, p.end))
            .collect();
        assert_eq!(
            spans,
            vec![
                ("Pre-pandemic", 2015, 2019),
                ("Pandemic", 2020, 2022),
                ("Post-pandemic", 2023, 2024),
            ]
        );

        let pandemic_only = vec![row("A", "High income", 2020, 1.0)];
        let labels: Vec<&str> = periods(&pandemic_only, &config)
            .iter()
            .map(|p| p.label)
            .collect();
        assert_eq!(labels, vec!["Pandemic"]);
    }

    #[test]
    fn development_gap_compares_income_groups() {
        let config = PipelineConfig::default();
        let rows = vec![
            row("A", "High income", 2020, 10.0),
            row("B", "Lower middle income", 2020, 4.0),
            row("C", "Low income", 2020, 100.0),
        ];
        let table = development_comparison(&rows, &config);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].developed_share, Some(10.0));
        assert_eq!(table[0].developing_share, Some(4.0));
        assert_eq!(table[0].share_gap(), Some(6.0));
        assert_eq!(table[0].growth_gap(), None);
    }

    #[test]
    fn resilience_needs_baseline_and_pandemic_observations() {
        let config = PipelineConfig::default();
        let rows = vec![
            row("A", "High income", 2018, 2.0),
            row("A", "High income", 2019, 4.0),
            row("A", "High income", 2021, 8.0),
            row("B", "High income", 2021, 5.0),
            row("C", "High income", 2016, 1.0),
            row("C", "High income", 2020, 3.0),
        ];
        let table = resilience_factors(&rows, &config);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].country, "A");
        assert_eq!(table[0].baseline_share, 3.0);
        assert_eq!(table[0].share_change(), 5.0);
    }

    #[test]
    fn conflict_threshold_is_exclusive() {
        let config = PipelineConfig::default();
        let mut rows = vec![
            row("A", "High income", 2019, 1.0),
            row("A", "High income", 2020, 2.0),
            row("B", "High income", 2020, 3.0),
            row("C", "High income", 2021, 4.0),
        ];
        rows[0].conflict_deaths = 60.0;
        rows[1].conflict_deaths = 41.0;
        rows[2].conflict_deaths = 100.0;

        let analysis = conflict_analysis(&rows, &config);
        assert_eq!(analysis.high_conflict, vec!["A".to_string()]);
        assert_eq!(analysis.groups[0].observations, 1);
        assert_eq!(analysis.groups[0].mean_share, Some(2.0));
        assert_eq!(analysis.groups[1].countries, 2);
        assert_eq!(analysis.groups[1].mean_share, Some(3.5));
        assert!(analysis.share_test.p_value.is_nan());
    }

    #[test]
    fn income_test_is_pooled_unless_welch_is_configured() {
        let resilience: Vec<ResilienceRow> = [
            ("A", "High income", 1.0),
            ("B", "High income", 2.0),
            ("C", "High income", 3.0),
            ("D", "Low income", 2.0),
            ("E", "Low income", 6.0),
            ("F", "Low income", 10.0),
        ]
        .into_iter()
        .map(|(country, income, change)| ResilienceRow {
            country: country.to_string(),
            income_group: Some(income.to_string()),
            region: None,
            baseline_share: 0.0,
            pandemic_share: change,
            mean_internet: None,
        })
        .collect();

        let mut config = PipelineConfig::default();
        let pooled = &resilience_tests(&resilience, &config)[0];
        let expected = StatsCalculator::perform_pooled_ttest(&[1.0, 2.0, 3.0], &[2.0, 6.0, 10.0]);
        assert!(pooled.test.ends_with("(Student t)"));
        assert_eq!(pooled.p_value, expected.p_value);
        assert_eq!(pooled.n, 6);

        config.reporting.equal_variance = false;
        let welch = &resilience_tests(&resilience, &config)[0];
        assert!(welch.test.ends_with("(Welch t)"));
        assert!(welch.p_value > pooled.p_value);
    }
}
