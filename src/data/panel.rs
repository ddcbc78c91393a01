//! Canonical country-year panel.

use crate::data::loader::text_column;
use crate::error::{PipelineError, PipelineResult};
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::path::Path;

pub const COUNTRY: &str = "country_name";
pub const ISO3: &str = "iso3";
pub const REGION: &str = "region";
pub const INCOME_GROUP: &str = "income_group";
pub const YEAR: &str = "year";
pub const ECOM_SALES: &str = "ecom_sales_usd_millions";
pub const ECOM_SHARE: &str = "ecom_share_pct";
pub const INTERNET_USERS: &str = "internet_users_pct";
pub const CONFLICT_DEATHS: &str = "conflict_deaths";
pub const CIVILIAN_DEATHS: &str = "civilian_deaths";
pub const ECOM_SALES_GROWTH: &str = "ecom_sales_growth";
pub const INTERNET_GROWTH: &str = "internet_growth";
pub const COVID_SHOCK: &str = "covid_19_shock";
pub const UKRAINE_CONFLICT: &str = "ukraine_conflict";

/// Derived columns the outlier filter can be pointed at.
pub const GROWTH_COLUMNS: [&str; 2] = [ECOM_SALES_GROWTH, INTERNET_GROWTH];

/// One observation of the panel: a single country in a single year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelRow {
    pub country_name: String,
    pub iso3: Option<String>,
    pub region: Option<String>,
    pub income_group: Option<String>,
    pub year: i32,
    pub ecom_sales_usd_millions: Option<f64>,
    pub ecom_share_pct: Option<f64>,
    pub internet_users_pct: Option<f64>,
    pub conflict_deaths: f64,
    pub civilian_deaths: f64,
    pub ecom_sales_growth: Option<f64>,
    pub internet_growth: Option<f64>,
    pub covid_19_shock: bool,
    pub ukraine_conflict: bool,
}

impl PanelRow {
    /// A row carrying only the e-commerce measures; enrichment fills the rest.
    pub fn new(
        country_name: String,
        year: i32,
        ecom_sales_usd_millions: Option<f64>,
        ecom_share_pct: Option<f64>,
    ) -> Self {
        Self {
            country_name,
            iso3: None,
            region: None,
            income_group: None,
            year,
            ecom_sales_usd_millions,
            ecom_share_pct,
            internet_users_pct: None,
            conflict_deaths: 0.0,
            civilian_deaths: 0.0,
            ecom_sales_growth: None,
            internet_growth: None,
            covid_19_shock: false,
            ukraine_conflict: false,
        }
    }

    /// Value of a named numeric column.
    pub fn measure(&self, column: &str) -> Option<f64> {
        match column {
            ECOM_SALES => self.ecom_sales_usd_millions,
            ECOM_SHARE => self.ecom_share_pct,
            INTERNET_USERS => self.internet_users_pct,
            CONFLICT_DEATHS => Some(self.conflict_deaths),
            CIVILIAN_DEATHS => Some(self.civilian_deaths),
            other => self.growth(other),
        }
    }

    /// Value of a named growth column.
    pub fn growth(&self, column: &str) -> Option<f64> {
        match column {
            ECOM_SALES_GROWTH => self.ecom_sales_growth,
            INTERNET_GROWTH => self.internet_growth,
            _ => None,
        }
    }
}

/// Convert panel rows into a DataFrame with the canonical column order.
pub fn to_dataframe(rows: &[PanelRow]) -> PipelineResult<DataFrame> {
    let df = DataFrame::new(vec![
        Column::new(
            COUNTRY.into(),
            rows.iter().map(|r| r.country_name.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            ISO3.into(),
            rows.iter().map(|r| r.iso3.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            REGION.into(),
            rows.iter().map(|r| r.region.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            INCOME_GROUP.into(),
            rows.iter().map(|r| r.income_group.clone()).collect::<Vec<_>>(),
        ),
        Column::new(YEAR.into(), rows.iter().map(|r| r.year).collect::<Vec<i32>>()),
        Column::new(
            ECOM_SALES.into(),
            rows.iter().map(|r| r.ecom_sales_usd_millions).collect::<Vec<_>>(),
        ),
        Column::new(
            ECOM_SHARE.into(),
            rows.iter().map(|r| r.ecom_share_pct).collect::<Vec<_>>(),
        ),
        Column::new(
            INTERNET_USERS.into(),
            rows.iter().map(|r| r.internet_users_pct).collect::<Vec<_>>(),
        ),
        Column::new(
            CONFLICT_DEATHS.into(),
            rows.iter().map(|r| r.conflict_deaths).collect::<Vec<f64>>(),
        ),
        Column::new(
            CIVILIAN_DEATHS.into(),
            rows.iter().map(|r| r.civilian_deaths).collect::<Vec<f64>>(),
        ),
        Column::new(
            ECOM_SALES_GROWTH.into(),
            rows.iter().map(|r| r.ecom_sales_growth).collect::<Vec<_>>(),
        ),
        Column::new(
            INTERNET_GROWTH.into(),
            rows.iter().map(|r| r.internet_growth).collect::<Vec<_>>(),
        ),
        Column::new(
            COVID_SHOCK.into(),
            rows.iter().map(|r| r.covid_19_shock).collect::<Vec<bool>>(),
        ),
        Column::new(
            UKRAINE_CONFLICT.into(),
            rows.iter().map(|r| r.ukraine_conflict).collect::<Vec<bool>>(),
        ),
    ])?;

    Ok(df)
}

/// Write a DataFrame as CSV with a header row, creating parent directories.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Read a previously written panel file, inferring column types.
pub fn read_panel(path: &Path) -> PipelineResult<DataFrame> {
    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(10000))
        .with_has_header(true)
        .finish()?
        .collect()?;
    Ok(df)
}

/// Rebuild typed rows from a panel DataFrame, e.g. one returned by [`read_panel`].
///
/// Rows without a country or a parseable year are skipped and counted in the log.
pub fn rows_from_dataframe(df: &DataFrame) -> PipelineResult<Vec<PanelRow>> {
    const SOURCE: &str = "panel";
    let text = |name: &str| text_column(df, SOURCE, name);
    let number = |name: &str| -> PipelineResult<Vec<Option<f64>>> {
        let column = df.column(name).map_err(|_| PipelineError::MissingColumn {
            name: SOURCE,
            column: name.to_string(),
        })?;
        // Non-strict cast: unparseable cells become null
        let values = column.cast(&DataType::Float64)?;
        Ok(values.f64()?.into_iter().collect())
    };
    let flag = |name: &str| -> PipelineResult<Vec<bool>> {
        Ok(text(name)?
            .into_iter()
            .map(|v| v.is_some_and(|s| s.eq_ignore_ascii_case("true") || s == "1"))
            .collect())
    };

    let countries = text(COUNTRY)?;
    let iso3 = text(ISO3)?;
    let regions = text(REGION)?;
    let income = text(INCOME_GROUP)?;
    let years = number(YEAR)?;
    let sales = number(ECOM_SALES)?;
    let share = number(ECOM_SHARE)?;
    let internet = number(INTERNET_USERS)?;
    let deaths = number(CONFLICT_DEATHS)?;
    let civilian = number(CIVILIAN_DEATHS)?;
    let sales_growth = number(ECOM_SALES_GROWTH)?;
    let internet_growth = number(INTERNET_GROWTH)?;
    let covid = flag(COVID_SHOCK)?;
    let ukraine = flag(UKRAINE_CONFLICT)?;

    let mut rows = Vec::with_capacity(df.height());
    let mut skipped = 0usize;
    for i in 0..df.height() {
        let (Some(country), Some(year)) = (countries[i].clone(), years[i]) else {
            skipped += 1;
            continue;
        };
        rows.push(PanelRow {
            country_name: country,
            iso3: iso3[i].clone(),
            region: regions[i].clone(),
            income_group: income[i].clone(),
            year: year as i32,
            ecom_sales_usd_millions: sales[i],
            ecom_share_pct: share[i],
            internet_users_pct: internet[i],
            conflict_deaths: deaths[i].unwrap_or(0.0),
            civilian_deaths: civilian[i].unwrap_or(0.0),
            ecom_sales_growth: sales_growth[i],
            internet_growth: internet_growth[i],
            covid_19_shock: covid[i],
            ukraine_conflict: ukraine[i],
        });
    }
    if skipped > 0 {
        log::warn!("panel: skipped {skipped} rows without country or year");
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataframe_keeps_canonical_column_order_and_nulls() {
        let mut row = PanelRow::new("Testland".into(), 2019, Some(35.0), None);
        row.region = Some("Europe & Central Asia".into());
        let df = to_dataframe(&[row]).unwrap();

        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names.first().map(String::as_str), Some(COUNTRY));
        assert_eq!(names.last().map(String::as_str), Some(UKRAINE_CONFLICT));
        assert_eq!(names.len(), 14);

        assert_eq!(df.column(ECOM_SHARE).unwrap().null_count(), 1);
        assert_eq!(df.column(ISO3).unwrap().null_count(), 1);
        assert_eq!(df.column(REGION).unwrap().null_count(), 0);
    }

    #[test]
    fn written_panel_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("panel.csv");
        let rows = vec![
            PanelRow::new("A".into(), 2019, Some(1.0), Some(2.0)),
            PanelRow::new("A".into(), 2020, Some(2.0), Some(3.0)),
        ];
        let mut df = to_dataframe(&rows).unwrap();
        write_csv(&mut df, &path).unwrap();

        let back = read_panel(&path).unwrap();
        assert_eq!(back.height(), 2);
        assert_eq!(back.width(), 14);
        assert_eq!(rows_from_dataframe(&back).unwrap(), rows);
    }
}
