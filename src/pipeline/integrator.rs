//! Integrator
//!
//! Normalises every source to `(country, year) -> metrics` and merges them
//! into one panel row per country-year of the primary e-commerce source.
//!
//! Stages run in a fixed order:
//! 1. segment filter + aggregation of the global source
//! 2. monthly-detail override for one country
//! 3. classification join (by country name)
//! 4. internet join (by iso3, year)
//! 5. excluded-region drop
//! 6. unclassified / excluded-territory drop
//! 7. region corrections
//! 8. minimum-coverage filter
//! 9. conflict join
//! 10. shock flags

use crate::config::PipelineConfig;
use crate::data::{
    ClassificationRecord, ConflictEvent, EcommerceRecord, InternetRecord, MonthlyRecord,
    PanelRow,
};
use crate::pipeline::names::CountryNames;
use crate::pipeline::report::{ConflictOutcome, IntegrationReport, OverrideOutcome};
use crate::pipeline::sources::{OptionalSource, Sources};
use std::collections::{BTreeMap, BTreeSet};

/// Running sum of a sales measure and mean of a share measure.
#[derive(Debug, Default, Clone, Copy)]
struct SalesShareAcc {
    sales_sum: f64,
    sales_n: usize,
    share_sum: f64,
    share_n: usize,
}

impl SalesShareAcc {
    fn add(&mut self, sales: Option<f64>, share: Option<f64>) {
        if let Some(v) = sales {
            self.sales_sum += v;
            self.sales_n += 1;
        }
        if let Some(v) = share {
            self.share_sum += v;
            self.share_n += 1;
        }
    }

    fn sales(&self) -> Option<f64> {
        (self.sales_n > 0).then_some(self.sales_sum)
    }

    fn share(&self) -> Option<f64> {
        (self.share_n > 0).then(|| self.share_sum / self.share_n as f64)
    }
}

/// Yearly values recomputed from the monthly detail series.
#[derive(Debug, Clone, PartialEq)]
pub struct YearlyOverride {
    pub year: i32,
    pub sales_usd_millions: f64,
    pub share_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyAggregate {
    pub years: Vec<YearlyOverride>,
    pub months_joined: usize,
    pub months_unmatched: usize,
}

pub struct Integrator<'a> {
    config: &'a PipelineConfig,
    names: CountryNames,
}

impl<'a> Integrator<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            names: CountryNames::new(&config.name_aliases),
        }
    }

    /// Build the integrated panel, sorted by (country, year).
    pub fn integrate(&self, sources: &Sources) -> (Vec<PanelRow>, IntegrationReport) {
        let mut report = IntegrationReport {
            ecommerce_rows: sources.ecommerce.len(),
            ..IntegrationReport::default()
        };

        let (rows, segment_rows) = self.aggregate_ecommerce(&sources.ecommerce);
        report.segment_rows = segment_rows;
        report.country_years_aggregated = rows.len();
        log::info!(
            "e-commerce: {} segment rows aggregated into {} country-years",
            segment_rows,
            rows.len()
        );

        let (rows, outcome) = self.apply_monthly_override(rows, &sources.monthly_detail);
        report.monthly_override = outcome;

        let (rows, misses) = self.join_classification(rows, &sources.classification);
        report.classification_misses = misses;

        let (rows, without_internet) = self.join_internet(rows, &sources.internet);
        report.rows_without_internet = without_internet;

        let (rows, dropped) = self.drop_excluded_regions(rows);
        report.rows_dropped_excluded_region = dropped;

        let (rows, unclassified, territories) = self.drop_unclassified(rows);
        report.rows_dropped_unclassified = unclassified;
        report.rows_dropped_excluded_territory = territories;

        let (rows, corrected) = self.apply_region_corrections(rows);
        report.region_corrections_applied = corrected;

        let (rows, dropped_countries, dropped_rows) = self.filter_min_coverage(rows);
        report.rows_dropped_min_coverage = dropped_rows;
        report.countries_dropped_min_coverage = dropped_countries;

        let (rows, conflict) = self.join_conflict(rows, &sources.conflict);
        report.conflict = conflict;

        let rows = self.flag_shocks(rows);

        report.rows_out = rows.len();
        report.countries_out = count_countries(&rows);
        log::info!(
            "integrated panel: {} rows, {} countries",
            report.rows_out,
            report.countries_out
        );

        (rows, report)
    }

    /// Keep the configured segment slice and aggregate it per (country, year):
    /// sales are summed, shares averaged.
    pub fn aggregate_ecommerce(&self, records: &[EcommerceRecord]) -> (Vec<PanelRow>, usize) {
        let seg = &self.config.segments;
        let mut groups: BTreeMap<(String, i32), SalesShareAcc> = BTreeMap::new();
        let mut segment_rows = 0;

        for r in records.iter().filter(|r| {
            r.market.as_deref() == Some(seg.market.as_str())
                && r.enterprise_size.as_deref() == Some(seg.enterprise_size.as_str())
                && r.sale_type.as_deref() == Some(seg.sale_type.as_str())
        }) {
            segment_rows += 1;
            groups
                .entry((self.names.canonical(&r.economy), r.year))
                .or_default()
                .add(r.sales_usd_millions, r.share_of_turnover_pct);
        }

        let rows = groups
            .into_iter()
            .map(|((country, year), acc)| PanelRow::new(country, year, acc.sales(), acc.share()))
            .collect();

        (rows, segment_rows)
    }

    /// Recompute yearly sales and share from the monthly detail series.
    ///
    /// The two series are inner-joined on (year, month): a month missing from
    /// either side, or carrying no value, is dropped rather than imputed.
    pub fn aggregate_monthly(&self, records: &[MonthlyRecord]) -> MonthlyAggregate {
        let cfg = &self.config.monthly_override;

        let series = |label: &str| {
            let mut by_month: BTreeMap<(i32, u32), Option<f64>> = BTreeMap::new();
            for r in records.iter().filter(|r| r.series == label) {
                if by_month.insert((r.year, r.month), r.value).is_some() {
                    log::warn!(
                        "monthly detail: duplicate '{label}' entry for {}-{:02}, last one kept",
                        r.year,
                        r.month
                    );
                }
            }
            by_month
        };
        let ecommerce = series(&cfg.ecommerce_label);
        let total = series(&cfg.total_label);

        let mut yearly: BTreeMap<i32, (f64, Vec<f64>)> = BTreeMap::new();
        let mut months_joined = 0;

        for (&(year, month), ecom) in &ecommerce {
            let Some(Some(total_sales)) = total.get(&(year, month)).copied() else {
                continue;
            };
            let Some(ecom) = *ecom else {
                continue;
            };
            months_joined += 1;
            let entry = yearly.entry(year).or_default();
            entry.0 += ecom;
            if total_sales != 0.0 {
                entry.1.push(ecom / total_sales * 100.0);
            }
            log::debug!("monthly detail: {year}-{month:02} joined");
        }

        let months: BTreeSet<(i32, u32)> = ecommerce.keys().chain(total.keys()).copied().collect();
        let months_unmatched = months.len() - months_joined;

        let years = yearly
            .into_iter()
            .map(|(year, (sales, shares))| YearlyOverride {
                year,
                sales_usd_millions: sales / cfg.unit_divisor * cfg.currency_rate,
                share_pct: (!shares.is_empty())
                    .then(|| shares.iter().sum::<f64>() / shares.len() as f64),
            })
            .collect();

        MonthlyAggregate {
            years,
            months_joined,
            months_unmatched,
        }
    }

    /// Replace the override country's rows for every year the monthly series covers.
    fn apply_monthly_override(
        &self,
        rows: Vec<PanelRow>,
        monthly: &OptionalSource<Vec<MonthlyRecord>>,
    ) -> (Vec<PanelRow>, OverrideOutcome) {
        let country = self.names.canonical(&self.config.monthly_override.country);
        let mut outcome = OverrideOutcome {
            country: country.clone(),
            ..OverrideOutcome::default()
        };

        let records = match monthly {
            OptionalSource::Present(records) => records,
            OptionalSource::Absent(reason) => {
                log::warn!("monthly override for {country} not applied: {reason}");
                outcome.absent_reason = Some(reason.clone());
                return (rows, outcome);
            }
        };

        let aggregate = self.aggregate_monthly(records);
        outcome.applied = true;
        outcome.months_joined = aggregate.months_joined;
        outcome.months_unmatched = aggregate.months_unmatched;
        outcome.years = aggregate.years.iter().map(|y| y.year).collect();

        if aggregate.years.is_empty() {
            log::warn!("monthly override for {country}: no month present in both series");
        }

        let covered: BTreeSet<i32> = outcome.years.iter().copied().collect();
        let before = rows.len();
        let mut rows: Vec<PanelRow> = rows
            .into_iter()
            .filter(|r| !(r.country_name == country && covered.contains(&r.year)))
            .collect();
        outcome.replaced_rows = before - rows.len();

        rows.extend(aggregate.years.into_iter().map(|y| {
            PanelRow::new(country.clone(), y.year, Some(y.sales_usd_millions), y.share_pct)
        }));
        rows.sort_by(|a, b| (&a.country_name, a.year).cmp(&(&b.country_name, b.year)));

        log::info!(
            "monthly override for {country}: {} years ({} months joined, {} unmatched), {} rows replaced",
            outcome.years.len(),
            outcome.months_joined,
            outcome.months_unmatched,
            outcome.replaced_rows
        );

        (rows, outcome)
    }

    /// Left-join iso3, region and income group on the country name.
    fn join_classification(
        &self,
        rows: Vec<PanelRow>,
        classification: &[ClassificationRecord],
    ) -> (Vec<PanelRow>, Vec<String>) {
        let mut lookup: BTreeMap<String, &ClassificationRecord> = BTreeMap::new();
        for c in classification {
            let key = self.names.canonical(&c.country);
            if lookup.contains_key(&key) {
                log::warn!("classification: duplicate entry for '{key}', first one kept");
                continue;
            }
            lookup.insert(key, c);
        }

        let mut misses = BTreeSet::new();
        let rows = rows
            .into_iter()
            .map(|row| match lookup.get(&row.country_name) {
                Some(c) => PanelRow {
                    iso3: c.iso3.clone(),
                    region: c.region.clone(),
                    income_group: c.income_group.clone(),
                    ..row
                },
                None => {
                    misses.insert(row.country_name.clone());
                    row
                }
            })
            .collect();

        for name in &misses {
            log::warn!("classification: no entry for '{name}'");
        }

        (rows, misses.into_iter().collect())
    }

    /// Left-join internet penetration on (iso3, year).
    fn join_internet(
        &self,
        rows: Vec<PanelRow>,
        internet: &[InternetRecord],
    ) -> (Vec<PanelRow>, usize) {
        let mut lookup: BTreeMap<(String, i32), Option<f64>> = BTreeMap::new();
        for r in internet {
            lookup.entry((r.iso3.clone(), r.year)).or_insert(r.users_pct);
        }

        let rows: Vec<PanelRow> = rows
            .into_iter()
            .map(|row| {
                let users = row
                    .iso3
                    .clone()
                    .and_then(|iso3| lookup.get(&(iso3, row.year)).copied().flatten());
                PanelRow {
                    internet_users_pct: users,
                    ..row
                }
            })
            .collect();

        let missing = rows.iter().filter(|r| r.internet_users_pct.is_none()).count();
        (rows, missing)
    }

    fn drop_excluded_regions(&self, rows: Vec<PanelRow>) -> (Vec<PanelRow>, usize) {
        let excluded = &self.config.filters.excluded_regions;
        let before = rows.len();
        let rows: Vec<PanelRow> = rows
            .into_iter()
            .filter(|r| !r.region.as_ref().is_some_and(|region| excluded.contains(region)))
            .collect();
        let dropped = before - rows.len();
        log::info!("excluded regions {excluded:?}: {dropped} rows dropped");
        (rows, dropped)
    }

    /// Drop rows without a region, then rows naming an excluded territory.
    fn drop_unclassified(&self, rows: Vec<PanelRow>) -> (Vec<PanelRow>, usize, usize) {
        let before = rows.len();
        let rows: Vec<PanelRow> = rows.into_iter().filter(|r| r.region.is_some()).collect();
        let unclassified = before - rows.len();

        let before = rows.len();
        let rows: Vec<PanelRow> = rows
            .into_iter()
            .filter(|r| !self.config.filters.is_excluded_territory(&r.country_name))
            .collect();
        let territories = before - rows.len();

        log::info!(
            "unclassified: {unclassified} rows dropped; excluded territories: {territories} rows dropped"
        );
        (rows, unclassified, territories)
    }

    fn apply_region_corrections(&self, rows: Vec<PanelRow>) -> (Vec<PanelRow>, usize) {
        let mut corrected = 0;
        let rows = rows
            .into_iter()
            .map(|row| match self.config.region_corrections.get(&row.country_name) {
                Some(region) if row.region.as_ref() != Some(region) => {
                    corrected += 1;
                    PanelRow {
                        region: Some(region.clone()),
                        ..row
                    }
                }
                _ => row,
            })
            .collect();
        if corrected > 0 {
            log::info!("region corrections: {corrected} rows updated");
        }
        (rows, corrected)
    }

    /// Drop every country with fewer than the configured number of rows.
    fn filter_min_coverage(&self, rows: Vec<PanelRow>) -> (Vec<PanelRow>, Vec<String>, usize) {
        let min = self.config.filters.min_country_years;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for r in &rows {
            *counts.entry(r.country_name.as_str()).or_default() += 1;
        }
        let dropped: BTreeSet<String> = counts
            .into_iter()
            .filter(|&(_, n)| n < min)
            .map(|(c, _)| c.to_string())
            .collect();

        let before = rows.len();
        let rows: Vec<PanelRow> = rows
            .into_iter()
            .filter(|r| !dropped.contains(&r.country_name))
            .collect();
        let dropped_rows = before - rows.len();

        log::info!(
            "minimum coverage ({min} rows): {} countries, {dropped_rows} rows dropped",
            dropped.len()
        );
        (rows, dropped.into_iter().collect(), dropped_rows)
    }

    /// Sum event deaths per (country, year) and left-join them, zero-filled.
    fn join_conflict(
        &self,
        rows: Vec<PanelRow>,
        conflict: &OptionalSource<Vec<ConflictEvent>>,
    ) -> (Vec<PanelRow>, ConflictOutcome) {
        let events = match conflict {
            OptionalSource::Present(events) => events,
            OptionalSource::Absent(reason) => {
                log::warn!("conflict deaths zero-filled, source absent: {reason}");
                let rows = rows
                    .into_iter()
                    .map(|row| PanelRow {
                        conflict_deaths: 0.0,
                        civilian_deaths: 0.0,
                        ..row
                    })
                    .collect();
                let outcome = ConflictOutcome {
                    available: false,
                    absent_reason: Some(reason.clone()),
                    ..ConflictOutcome::default()
                };
                return (rows, outcome);
            }
        };

        let mut totals: BTreeMap<(String, i32), (f64, f64)> = BTreeMap::new();
        for e in events {
            let entry = totals
                .entry((self.names.canonical(&e.country), e.year))
                .or_default();
            entry.0 += e.best.unwrap_or(0.0);
            entry.1 += e.civilian_deaths.unwrap_or(0.0);
        }

        let mut matched = 0;
        let rows = rows
            .into_iter()
            .map(|row| {
                let (battle, civilian) = match totals.get(&(row.country_name.clone(), row.year)) {
                    Some(&deaths) => {
                        matched += 1;
                        deaths
                    }
                    None => (0.0, 0.0),
                };
                PanelRow {
                    conflict_deaths: battle,
                    civilian_deaths: civilian,
                    ..row
                }
            })
            .collect();

        log::info!(
            "conflict: {} events in {} country-years, {matched} panel rows matched",
            events.len(),
            totals.len()
        );
        let outcome = ConflictOutcome {
            available: true,
            absent_reason: None,
            events: events.len(),
            country_years: totals.len(),
            rows_matched: matched,
        };
        (rows, outcome)
    }

    fn flag_shocks(&self, rows: Vec<PanelRow>) -> Vec<PanelRow> {
        let shocks = &self.config.shocks;
        rows.into_iter()
            .map(|row| PanelRow {
                covid_19_shock: shocks.is_pandemic(row.year),
                ukraine_conflict: shocks.is_conflict(row.year),
                ..row
            })
            .collect()
    }
}

pub(crate) fn count_countries(rows: &[PanelRow]) -> usize {
    rows.iter()
        .map(|r| r.country_name.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}
