//! Raw Source Records
//! Typed rows for each external dataset, parsed out of all-text DataFrames.
//!
//! A field that is blank is missing; a field that is present but fails to
//! coerce marks the whole row malformed. Malformed rows are excluded and
//! counted, never coerced to zero.

use crate::data::loader::text_column;
use crate::error::PipelineResult;
use chrono::{Datelike, NaiveDate};
use polars::prelude::DataFrame;

pub const ECOMMERCE: &str = "e-commerce";
pub const MONTHLY_DETAIL: &str = "monthly detail";
pub const CLASSIFICATION: &str = "classification";
pub const INTERNET: &str = "internet";
pub const CONFLICT: &str = "conflict events";

/// Columns each parser reads; loaders skip everything else.
pub const ECOMMERCE_COLUMNS: [&str; 7] = [
    "Economy Label",
    "Year",
    "Market Label",
    "EnterpriseSize Label",
    "ECommerceSale Label",
    "US$ at current prices in millions",
    "Percentage in total turnover",
];
pub const MONTHLY_COLUMNS: [&str; 3] = ["REF_DATE", "Sales", "VALUE"];
pub const CLASSIFICATION_COLUMNS: [&str; 4] = ["Economy", "Code", "Region", "Income group"];
pub const INTERNET_COLUMNS: [&str; 3] = [
    "Code",
    "Year",
    "Individuals using the Internet (% of population)",
];
pub const CONFLICT_COLUMNS: [&str; 4] = ["year", "country", "best", "deaths_civilians"];

/// Global e-commerce sales by economy, year and segment.
#[derive(Debug, Clone, PartialEq)]
pub struct EcommerceRecord {
    pub economy: String,
    pub year: i32,
    pub market: Option<String>,
    pub enterprise_size: Option<String>,
    pub sale_type: Option<String>,
    pub sales_usd_millions: Option<f64>,
    pub share_of_turnover_pct: Option<f64>,
}

/// One observation of a labelled monthly series for a single country.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRecord {
    pub year: i32,
    pub month: u32,
    pub series: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRecord {
    pub country: String,
    pub iso3: Option<String>,
    pub region: Option<String>,
    pub income_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InternetRecord {
    pub iso3: String,
    pub year: i32,
    pub users_pct: Option<f64>,
}

/// A single armed-conflict event.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictEvent {
    pub country: String,
    pub year: i32,
    pub best: Option<f64>,
    pub civilian_deaths: Option<f64>,
}

/// Parsed rows of one source plus the number of rows that failed coercion.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub read: usize,
    pub malformed: usize,
}

impl<T> Parsed<T> {
    fn new(read: usize) -> Self {
        Self {
            records: Vec::with_capacity(read),
            read,
            malformed: 0,
        }
    }

    fn log(self, source: &str) -> Self {
        if self.malformed > 0 {
            log::warn!(
                "{source}: excluded {} malformed rows of {}",
                self.malformed,
                self.read
            );
        }
        self
    }
}

struct Malformed;

/// Spreadsheet and pandas spellings of a missing value.
const MISSING_TOKENS: [&str; 4] = ["nan", "na", "n/a", "null"];

fn number(raw: &Option<String>) -> Result<Option<f64>, Malformed> {
    let Some(s) = raw else {
        return Ok(None);
    };
    if MISSING_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t)) {
        return Ok(None);
    }
    match s.replace(',', "").parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        // inf, infinity and anything unparseable
        _ => Err(Malformed),
    }
}

fn required_year(raw: &Option<String>) -> Result<i32, Malformed> {
    let s = raw.as_deref().ok_or(Malformed)?;
    if let Ok(year) = s.parse::<i32>() {
        return Ok(year);
    }
    match s.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.abs() < i32::MAX as f64 => Ok(f as i32),
        _ => Err(Malformed),
    }
}

fn required_text(raw: &Option<String>) -> Result<String, Malformed> {
    raw.clone().ok_or(Malformed)
}

/// Parse a `YYYY-MM` or `YYYY-MM-DD` reference date into (year, month).
pub fn parse_ref_date(raw: &str) -> Option<(i32, u32)> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
        .ok()
        .map(|d| (d.year(), d.month()))
}

pub fn parse_ecommerce(df: &DataFrame) -> PipelineResult<Parsed<EcommerceRecord>> {
    let economy = text_column(df, ECOMMERCE, "Economy Label")?;
    let year = text_column(df, ECOMMERCE, "Year")?;
    let market = text_column(df, ECOMMERCE, "Market Label")?;
    let size = text_column(df, ECOMMERCE, "EnterpriseSize Label")?;
    let sale = text_column(df, ECOMMERCE, "ECommerceSale Label")?;
    let sales = text_column(df, ECOMMERCE, "US$ at current prices in millions")?;
    let share = text_column(df, ECOMMERCE, "Percentage in total turnover")?;

    let mut parsed = Parsed::new(df.height());
    for i in 0..df.height() {
        let row = (|| {
            Ok::<_, Malformed>(EcommerceRecord {
                economy: required_text(&economy[i])?,
                year: required_year(&year[i])?,
                market: market[i].clone(),
                enterprise_size: size[i].clone(),
                sale_type: sale[i].clone(),
                sales_usd_millions: number(&sales[i])?,
                share_of_turnover_pct: number(&share[i])?,
            })
        })();
        match row {
            Ok(record) => parsed.records.push(record),
            Err(Malformed) => parsed.malformed += 1,
        }
    }
    Ok(parsed.log(ECOMMERCE))
}

pub fn parse_monthly(df: &DataFrame) -> PipelineResult<Parsed<MonthlyRecord>> {
    let date = text_column(df, MONTHLY_DETAIL, "REF_DATE")?;
    let series = text_column(df, MONTHLY_DETAIL, "Sales")?;
    let value = text_column(df, MONTHLY_DETAIL, "VALUE")?;

    let mut parsed = Parsed::new(df.height());
    for i in 0..df.height() {
        let row = (|| {
            let (year, month) = date[i]
                .as_deref()
                .and_then(parse_ref_date)
                .ok_or(Malformed)?;
            Ok::<_, Malformed>(MonthlyRecord {
                year,
                month,
                series: required_text(&series[i])?,
                value: number(&value[i])?,
            })
        })();
        match row {
            Ok(record) => parsed.records.push(record),
            Err(Malformed) => parsed.malformed += 1,
        }
    }
    Ok(parsed.log(MONTHLY_DETAIL))
}

pub fn parse_classification(df: &DataFrame) -> PipelineResult<Parsed<ClassificationRecord>> {
    let country = text_column(df, CLASSIFICATION, "Economy")?;
    let code = text_column(df, CLASSIFICATION, "Code")?;
    let region = text_column(df, CLASSIFICATION, "Region")?;
    let income = text_column(df, CLASSIFICATION, "Income group")?;

    let mut parsed = Parsed::new(df.height());
    for i in 0..df.height() {
        match required_text(&country[i]) {
            Ok(name) => parsed.records.push(ClassificationRecord {
                country: name,
                iso3: code[i].clone(),
                region: region[i].clone(),
                income_group: income[i].clone(),
            }),
            Err(Malformed) => parsed.malformed += 1,
        }
    }
    Ok(parsed.log(CLASSIFICATION))
}

pub fn parse_internet(df: &DataFrame) -> PipelineResult<Parsed<InternetRecord>> {
    let code = text_column(df, INTERNET, "Code")?;
    let year = text_column(df, INTERNET, "Year")?;
    let users = text_column(df, INTERNET, "Individuals using the Internet (% of population)")?;

    let mut parsed = Parsed::new(df.height());
    for i in 0..df.height() {
        // Aggregates such as "World" carry no code and can never join on iso3
        let Some(iso3) = code[i].clone() else {
            continue;
        };
        let row = (|| {
            Ok::<_, Malformed>(InternetRecord {
                iso3,
                year: required_year(&year[i])?,
                users_pct: number(&users[i])?,
            })
        })();
        match row {
            Ok(record) => parsed.records.push(record),
            Err(Malformed) => parsed.malformed += 1,
        }
    }
    Ok(parsed.log(INTERNET))
}

pub fn parse_conflict(df: &DataFrame) -> PipelineResult<Parsed<ConflictEvent>> {
    let year = text_column(df, CONFLICT, "year")?;
    let country = text_column(df, CONFLICT, "country")?;
    let best = text_column(df, CONFLICT, "best")?;
    let civilians = text_column(df, CONFLICT, "deaths_civilians")?;

    let mut parsed = Parsed::new(df.height());
    for i in 0..df.height() {
        let row = (|| {
            Ok::<_, Malformed>(ConflictEvent {
                country: required_text(&country[i])?,
                year: required_year(&year[i])?,
                best: number(&best[i])?,
                civilian_deaths: number(&civilians[i])?,
            })
        })();
        match row {
            Ok(record) => parsed.records.push(record),
            Err(Malformed) => parsed.malformed += 1,
        }
    }
    Ok(parsed.log(CONFLICT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn frame(columns: &[(&str, Vec<Option<&str>>)]) -> DataFrame {
        DataFrame::new(
            columns
                .iter()
                .map(|(name, values)| Column::new((*name).into(), values.clone()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn ref_dates_accept_month_and_day_forms() {
        assert_eq!(parse_ref_date("2020-06"), Some((2020, 6)));
        assert_eq!(parse_ref_date("2020-12-01"), Some((2020, 12)));
        assert_eq!(parse_ref_date("June 2020"), None);
    }

    #[test]
    fn non_numeric_values_are_counted_not_zeroed() {
        let df = frame(&[
            ("year", vec![Some("2019"), Some("2019"), Some("20x9")]),
            ("country", vec![Some("A"), Some("B"), Some("C")]),
            ("best", vec![Some("5"), Some("five"), Some("1")]),
            ("deaths_civilians", vec![Some("1"), Some("0"), None]),
        ]);
        let parsed = parse_conflict(&df).unwrap();
        assert_eq!(parsed.read, 3);
        assert_eq!(parsed.malformed, 2);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].country, "A");
        assert_eq!(parsed.records[0].best, Some(5.0));
    }

    #[test]
    fn nan_cells_are_missing_and_infinities_malformed() {
        let df = frame(&[
            ("year", vec![Some("2019"), Some("2019"), Some("2019"), Some("2019")]),
            ("country", vec![Some("A"), Some("B"), Some("C"), Some("D")]),
            ("best", vec![Some("NaN"), Some("nan"), Some("NA"), Some("inf")]),
            ("deaths_civilians", vec![Some("1"), None, Some("-Infinity"), Some("0")]),
        ]);
        let parsed = parse_conflict(&df).unwrap();
        assert_eq!(parsed.malformed, 2);
        let kept: Vec<(&str, Option<f64>)> = parsed
            .records
            .iter()
            .map(|r| (r.country.as_str(), r.best))
            .collect();
        assert_eq!(kept, vec![("A", None), ("B", None)]);
    }

    #[test]
    fn blank_measures_are_missing_not_malformed() {
        let df = frame(&[
            ("Code", vec![Some("DEU"), None]),
            ("Year", vec![Some("2019.0"), Some("2019")]),
            (
                "Individuals using the Internet (% of population)",
                vec![None, Some("50")],
            ),
        ]);
        let parsed = parse_internet(&df).unwrap();
        assert_eq!(parsed.malformed, 0);
        assert_eq!(
            parsed.records,
            vec![InternetRecord {
                iso3: "DEU".to_string(),
                year: 2019,
                users_pct: None,
            }]
        );
    }
}
