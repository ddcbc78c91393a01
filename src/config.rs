//! Pipeline configuration.
//!
//! Every dataset-specific constant the study depends on lives here rather than
//! in the stages, so the Integrator and Cleaner stay functions of
//! `(input tables, config)`. All sections fall back to the study defaults, so a
//! TOML file only needs to name what it overrides.

use crate::data::panel::GROWTH_COLUMNS;
use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sources: SourcesConfig,
    pub segments: SegmentConfig,
    pub monthly_override: MonthlyOverrideConfig,
    pub filters: FilterConfig,
    /// Country name -> corrected region.
    pub region_corrections: BTreeMap<String, String>,
    /// Source spelling -> canonical country name.
    pub name_aliases: BTreeMap<String, String>,
    pub shocks: ShockConfig,
    pub cleaning: CleaningConfig,
    pub reporting: ReportingConfig,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: SourcesConfig::default(),
            segments: SegmentConfig::default(),
            monthly_override: MonthlyOverrideConfig::default(),
            filters: FilterConfig::default(),
            region_corrections: BTreeMap::from([(
                "Malta".to_string(),
                "Europe & Central Asia".to_string(),
            )]),
            name_aliases: BTreeMap::new(),
            shocks: ShockConfig::default(),
            cleaning: CleaningConfig::default(),
            reporting: ReportingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub data_dir: PathBuf,
    pub ecommerce: PathBuf,
    pub monthly_detail: Option<PathBuf>,
    pub classification: PathBuf,
    pub classification_sheet: String,
    pub internet: PathBuf,
    pub conflict: Option<PathBuf>,
    /// First worksheet when unset.
    pub conflict_sheet: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Datasets"),
            ecommerce: PathBuf::from("US_ECommerceTotal (1).csv"),
            monthly_detail: Some(PathBuf::from("Canada_e-com-sales.csv")),
            classification: PathBuf::from("CLASS_2025_10_07 (1).xlsx"),
            classification_sheet: "List of economies".to_string(),
            internet: PathBuf::from("share-of-individuals-using-the-internet.csv"),
            conflict: Some(PathBuf::from("GEDEvent_v25_1.xlsx")),
            conflict_sheet: None,
        }
    }
}

impl SourcesConfig {
    /// Resolve a source file against the data directory.
    pub fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }
}

/// The segment slice of the global e-commerce source that is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub market: String,
    pub enterprise_size: String,
    pub sale_type: String,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            market: "Total".to_string(),
            enterprise_size: "All (persons employed)".to_string(),
            sale_type: "Total".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyOverrideConfig {
    pub country: String,
    pub ecommerce_label: String,
    pub total_label: String,
    /// Source values are divided by this to reach millions.
    pub unit_divisor: f64,
    /// Multiplier from the source currency into US$.
    pub currency_rate: f64,
}

impl Default for MonthlyOverrideConfig {
    fn default() -> Self {
        Self {
            country: "Canada".to_string(),
            ecommerce_label: "Retail E-commerce sales, unadjusted".to_string(),
            total_label: "Retail trade, unadjusted [44-453]".to_string(),
            unit_divisor: 1000.0,
            currency_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub excluded_regions: Vec<String>,
    /// Case-insensitive substrings of country names that are dropped.
    pub excluded_name_patterns: Vec<String>,
    pub min_country_years: usize,
    pub year_min: i32,
    pub year_max: i32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_regions: vec!["Latin America & Caribbean".to_string()],
            excluded_name_patterns: vec![
                "Hong Kong".to_string(),
                "Macao".to_string(),
                "SAR".to_string(),
            ],
            min_country_years: 2,
            year_min: 2012,
            year_max: 2024,
        }
    }
}

impl FilterConfig {
    pub fn is_excluded_territory(&self, country: &str) -> bool {
        let name = country.to_lowercase();
        self.excluded_name_patterns
            .iter()
            .any(|p| name.contains(&p.to_lowercase()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShockConfig {
    pub pandemic_start: i32,
    pub pandemic_end: i32,
    pub conflict_onset: i32,
}

impl Default for ShockConfig {
    fn default() -> Self {
        Self {
            pandemic_start: 2020,
            pandemic_end: 2022,
            conflict_onset: 2022,
        }
    }
}

impl ShockConfig {
    pub fn is_pandemic(&self, year: i32) -> bool {
        (self.pandemic_start..=self.pandemic_end).contains(&year)
    }

    pub fn is_conflict(&self, year: i32) -> bool {
        year >= self.conflict_onset
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Growth columns that go through the IQR filter, in order.
    pub outlier_columns: Vec<String>,
    pub iqr_multiplier: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            outlier_columns: vec!["ecom_sales_growth".to_string()],
            iqr_multiplier: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub high_conflict_threshold: f64,
    pub crisis_markers: Vec<CrisisMarker>,
    pub baseline_start: i32,
    pub developed_income_groups: Vec<String>,
    pub developing_income_groups: Vec<String>,
    /// Pooled-variance t-tests; Welch's when false.
    pub equal_variance: bool,
    pub charts: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        let crisis_markers = [
            (2008, "Financial Crisis"),
            (2020, "COVID-19 Pandemic"),
            (2022, "Ukraine War"),
        ]
        .into_iter()
        .map(|(year, label)| CrisisMarker {
            year,
            label: label.to_string(),
        })
        .collect();
        Self {
            high_conflict_threshold: 100.0,
            crisis_markers,
            baseline_start: 2017,
            developed_income_groups: vec!["High income".to_string()],
            developing_income_groups: vec![
                "Upper middle income".to_string(),
                "Lower middle income".to_string(),
            ],
            equal_variance: true,
            charts: true,
        }
    }
}

/// A vertical marker drawn on trend charts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisMarker {
    pub year: i32,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub panel_file: String,
    pub report_file: String,
    pub charts_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("outputs"),
            panel_file: "master_panel.csv".to_string(),
            report_file: "pipeline_report.json".to_string(),
            charts_dir: "Visualizations".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn panel_path(&self) -> PathBuf {
        self.dir.join(&self.panel_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(&self.report_file)
    }
}

impl PipelineConfig {
    /// Load a TOML configuration file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> PipelineResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.filters.year_min > self.filters.year_max {
            return Err(PipelineError::Config(format!(
                "year window is empty: {} > {}",
                self.filters.year_min, self.filters.year_max
            )));
        }
        if self.shocks.pandemic_start > self.shocks.pandemic_end {
            return Err(PipelineError::Config(format!(
                "pandemic window is empty: {} > {}",
                self.shocks.pandemic_start, self.shocks.pandemic_end
            )));
        }
        if self.monthly_override.unit_divisor == 0.0 {
            return Err(PipelineError::Config("unit_divisor must be non-zero".into()));
        }
        if self.cleaning.iqr_multiplier < 0.0 {
            return Err(PipelineError::Config("iqr_multiplier must be >= 0".into()));
        }
        if let Some(column) = self
            .cleaning
            .outlier_columns
            .iter()
            .find(|c| !GROWTH_COLUMNS.contains(&c.as_str()))
        {
            return Err(PipelineError::Config(format!(
                "unknown outlier column {column:?}, expected one of {GROWTH_COLUMNS:?}"
            )));
        }
        Ok(())
    }
}
