//! Reporter
//!
//! Consumes the canonical panel and writes the summary tables, the
//! research-question tables and the charts.

pub mod research;
pub mod tables;

use crate::charts::ChartRenderer;
use crate::config::PipelineConfig;
use crate::data::panel::{self, PanelRow};
use crate::error::PipelineResult;
use crate::stats::ColumnSummary;
use polars::prelude::DataFrame;
use research::{ConflictAnalysis, DevelopmentRow, ResilienceRow, TestResult};
use std::path::{Path, PathBuf};
use tables::{CovidImpactRow, RegionalRow};

/// Every table the Reporter derives from one panel.
#[derive(Debug, Clone)]
pub struct ReportTables {
    pub summary: Vec<ColumnSummary>,
    pub regional: Vec<RegionalRow>,
    pub covid: Vec<CovidImpactRow>,
    pub development: Vec<DevelopmentRow>,
    pub resilience: Vec<ResilienceRow>,
    pub tests: Vec<TestResult>,
    pub conflict: ConflictAnalysis,
}

/// Files written by [`Reporter::write`].
#[derive(Debug, Clone, Default)]
pub struct ReportFiles {
    pub tables: Vec<PathBuf>,
    pub charts: Vec<PathBuf>,
}

pub struct Reporter<'a> {
    config: &'a PipelineConfig,
    rows: &'a [PanelRow],
}

impl<'a> Reporter<'a> {
    pub fn new(config: &'a PipelineConfig, rows: &'a [PanelRow]) -> Self {
        Self { config, rows }
    }

    /// Read a panel file written by a previous run.
    pub fn load_panel(path: &Path) -> PipelineResult<Vec<PanelRow>> {
        let df = panel::read_panel(path)?;
        let rows = panel::rows_from_dataframe(&df)?;
        log::info!("panel: {} rows read from {}", rows.len(), path.display());
        Ok(rows)
    }

    pub fn build(&self) -> ReportTables {
        let resilience = research::resilience_factors(self.rows, self.config);
        let conflict = research::conflict_analysis(self.rows, self.config);
        let mut tests = research::resilience_tests(&resilience, self.config);
        tests.push(conflict.share_test.clone());

        ReportTables {
            summary: tables::summary_statistics(self.rows),
            regional: tables::regional_comparison(self.rows),
            covid: tables::covid_impact(self.rows),
            development: research::development_comparison(self.rows, self.config),
            resilience,
            tests,
            conflict,
        }
    }

    /// Build and write every table into `out_dir`, plus the charts when enabled.
    pub fn write(&self, out_dir: &Path) -> PipelineResult<ReportFiles> {
        let built = self.build();

        let frames: Vec<(&str, DataFrame)> = vec![
            ("summary_statistics.csv", tables::summary_frame(&built.summary)?),
            ("regional_comparison.csv", tables::regional_frame(&built.regional)?),
            ("covid_impact.csv", tables::covid_frame(&built.covid)?),
            (
                "development_comparison.csv",
                research::development_frame(&built.development)?,
            ),
            (
                "resilience_factors.csv",
                research::resilience_frame(&built.resilience)?,
            ),
            ("resilience_tests.csv", research::tests_frame(&built.tests)?),
            ("conflict_analysis.csv", research::conflict_frame(&built.conflict)?),
        ];

        let mut files = ReportFiles::default();
        for (name, mut df) in frames {
            let path = out_dir.join(name);
            panel::write_csv(&mut df, &path)?;
            log::info!("{name}: {} rows", df.height());
            files.tables.push(path);
        }

        if self.config.reporting.charts {
            let charts_dir = out_dir.join(&self.config.output.charts_dir);
            let renderer = ChartRenderer::new(self.config, &charts_dir);
            files.charts = renderer.render_all(self.rows, &built.regional);
        }

        Ok(files)
    }
}
