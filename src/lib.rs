//! E-commerce resilience panel
//!
//! Integrates the global e-commerce, classification, internet and conflict
//! sources into one country-year panel, cleans it, and reports on it.

pub mod charts;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod stats;

pub use config::PipelineConfig;
pub use data::PanelRow;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{build_panel, run, PipelineOutcome, PipelineReport};
pub use report::Reporter;
