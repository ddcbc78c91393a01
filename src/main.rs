//! ecom-panel - build the e-commerce resilience panel and report on it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ecom_panel::{pipeline, PipelineConfig, Reporter};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ecom-panel", version, about)]
struct Cli {
    /// TOML configuration file; study defaults when omitted.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Directory holding the raw source files.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Directory receiving the panel, the run report and the tables.
    #[arg(long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Skip chart rendering.
    #[arg(long, global = true)]
    no_charts: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the panel, then write every report table and chart.
    Run,
    /// Build and persist the panel only.
    Build,
    /// Report on an existing panel file.
    Report {
        /// Panel file; defaults to the configured output panel.
        #[arg(long, value_name = "FILE")]
        panel: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.sources.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.clone();
    }
    if cli.no_charts {
        config.reporting.charts = false;
    }
    Ok(config)
}

fn report(config: &PipelineConfig, rows: &[ecom_panel::PanelRow]) -> Result<()> {
    let files = Reporter::new(config, rows)
        .write(&config.output.dir)
        .context("writing report tables")?;
    log::info!(
        "report: {} tables, {} charts",
        files.tables.len(),
        files.charts.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Run => {
            let outcome = pipeline::run(&config).context("building panel")?;
            report(&config, &outcome.panel)?;
        }
        Command::Build => {
            let outcome = pipeline::run(&config).context("building panel")?;
            println!(
                "{} rows, {} countries -> {}",
                outcome.report.cleaning.rows_out,
                outcome.report.cleaning.countries_out,
                outcome.panel_path.display()
            );
        }
        Command::Report { panel } => {
            let path = panel.clone().unwrap_or_else(|| config.output.panel_path());
            let rows = Reporter::load_panel(&path)
                .with_context(|| format!("reading panel {}", path.display()))?;
            report(&config, &rows)?;
        }
    }

    Ok(())
}
