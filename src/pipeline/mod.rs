//! Pipeline module - Integrator, Cleaner and the end-to-end driver

pub mod cleaner;
pub mod integrator;
pub mod names;
pub mod report;
pub mod sources;

pub use cleaner::{pct_change, Cleaner};
pub use integrator::Integrator;
pub use names::CountryNames;
pub use report::{CleaningReport, ConflictOutcome, IntegrationReport, OverrideOutcome, PipelineReport};
pub use sources::{OptionalSource, Sources};

use crate::config::PipelineConfig;
use crate::data::panel;
use crate::data::PanelRow;
use crate::error::PipelineResult;
use std::fs;
use std::path::PathBuf;

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub panel: Vec<PanelRow>,
    pub report: PipelineReport,
    pub panel_path: PathBuf,
    pub report_path: PathBuf,
}

/// Integrate and clean already loaded sources. No IO.
pub fn build_panel(sources: &Sources, config: &PipelineConfig) -> (Vec<PanelRow>, PipelineReport) {
    let (integrated, integration) = Integrator::new(config).integrate(sources);
    let (panel, cleaning) = Cleaner::new(config).clean(integrated);

    let report = PipelineReport {
        malformed_rows: sources.malformed_rows.clone(),
        integration,
        cleaning,
    };
    (panel, report)
}

/// Load every source, build the panel and persist it with its stage report.
pub fn run(config: &PipelineConfig) -> PipelineResult<PipelineOutcome> {
    let sources = Sources::load(config)?;
    for (source, count) in sources.malformed_rows.iter().filter(|(_, n)| **n > 0) {
        log::warn!("{source}: {count} malformed rows excluded");
    }

    let (rows, report) = build_panel(&sources, config);

    let panel_path = config.output.panel_path();
    let mut df = panel::to_dataframe(&rows)?;
    panel::write_csv(&mut df, &panel_path)?;
    log::info!("panel written to {}", panel_path.display());

    let report_path = config.output.report_path();
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    log::info!("stage report written to {}", report_path.display());

    Ok(PipelineOutcome {
        panel: rows,
        report,
        panel_path,
        report_path,
    })
}
