//! Source acquisition.
//!
//! Required sources abort the run when they cannot be read; optional
//! enrichment sources degrade to [`OptionalSource::Absent`] with the reason.

use crate::config::PipelineConfig;
use crate::data::records::{self, Parsed};
use crate::data::{
    ClassificationRecord, ConflictEvent, DataLoader, EcommerceRecord, InternetRecord,
    MonthlyRecord,
};
use crate::error::{PipelineError, PipelineResult};
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// An enrichment source that may be missing without failing the run.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionalSource<T> {
    Present(T),
    Absent(String),
}

impl<T> OptionalSource<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, OptionalSource::Present(_))
    }

    pub fn as_present(&self) -> Option<&T> {
        match self {
            OptionalSource::Present(value) => Some(value),
            OptionalSource::Absent(_) => None,
        }
    }
}

/// All raw inputs of a run, already parsed into typed records.
#[derive(Debug, Clone)]
pub struct Sources {
    pub ecommerce: Vec<EcommerceRecord>,
    pub monthly_detail: OptionalSource<Vec<MonthlyRecord>>,
    pub classification: Vec<ClassificationRecord>,
    pub internet: Vec<InternetRecord>,
    pub conflict: OptionalSource<Vec<ConflictEvent>>,
    pub malformed_rows: BTreeMap<String, usize>,
}

impl Sources {
    /// Load every source named by the configuration.
    pub fn load(config: &PipelineConfig) -> PipelineResult<Self> {
        let src = &config.sources;
        let mut malformed_rows = BTreeMap::new();

        let ecommerce = required(
            records::ECOMMERCE,
            &src.resolve(&src.ecommerce),
            None,
            &records::ECOMMERCE_COLUMNS,
            records::parse_ecommerce,
            &mut malformed_rows,
        )?;
        let classification = required(
            records::CLASSIFICATION,
            &src.resolve(&src.classification),
            Some(src.classification_sheet.as_str()),
            &records::CLASSIFICATION_COLUMNS,
            records::parse_classification,
            &mut malformed_rows,
        )?;
        let internet = required(
            records::INTERNET,
            &src.resolve(&src.internet),
            None,
            &records::INTERNET_COLUMNS,
            records::parse_internet,
            &mut malformed_rows,
        )?;

        let monthly_detail = optional(
            records::MONTHLY_DETAIL,
            src.monthly_detail.as_deref().map(|p| src.resolve(p)),
            None,
            &records::MONTHLY_COLUMNS,
            records::parse_monthly,
            &mut malformed_rows,
        );
        let conflict = optional(
            records::CONFLICT,
            src.conflict.as_deref().map(|p| src.resolve(p)),
            src.conflict_sheet.as_deref(),
            &records::CONFLICT_COLUMNS,
            records::parse_conflict,
            &mut malformed_rows,
        );

        Ok(Self {
            ecommerce,
            monthly_detail,
            classification,
            internet,
            conflict,
            malformed_rows,
        })
    }
}

fn read<T>(
    path: &Path,
    sheet: Option<&str>,
    columns: &[&str],
    parse: fn(&DataFrame) -> PipelineResult<Parsed<T>>,
) -> PipelineResult<Parsed<T>> {
    let df = DataLoader::new(path)
        .with_sheet(sheet)
        .with_columns(columns)
        .load()?;
    parse(&df)
}

fn required<T>(
    name: &'static str,
    path: &Path,
    sheet: Option<&str>,
    columns: &[&str],
    parse: fn(&DataFrame) -> PipelineResult<Parsed<T>>,
    malformed_rows: &mut BTreeMap<String, usize>,
) -> PipelineResult<Vec<T>> {
    let parsed =
        read(path, sheet, columns, parse).map_err(|e| PipelineError::MissingRequiredSource {
            name,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    log::info!(
        "{name}: {} records from {}",
        parsed.records.len(),
        path.display()
    );
    malformed_rows.insert(name.to_string(), parsed.malformed);
    Ok(parsed.records)
}

fn optional<T>(
    name: &'static str,
    path: Option<PathBuf>,
    sheet: Option<&str>,
    columns: &[&str],
    parse: fn(&DataFrame) -> PipelineResult<Parsed<T>>,
    malformed_rows: &mut BTreeMap<String, usize>,
) -> OptionalSource<Vec<T>> {
    let Some(path) = path else {
        log::warn!("{name}: not configured, enrichment skipped");
        return OptionalSource::Absent("not configured".to_string());
    };

    match read(&path, sheet, columns, parse) {
        Ok(parsed) => {
            log::info!(
                "{name}: {} records from {}",
                parsed.records.len(),
                path.display()
            );
            malformed_rows.insert(name.to_string(), parsed.malformed);
            OptionalSource::Present(parsed.records)
        }
        Err(e) => {
            log::warn!(
                "{name}: could not be loaded from {}, enrichment skipped: {e}",
                path.display()
            );
            OptionalSource::Absent(e.to_string())
        }
    }
}
