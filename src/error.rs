//! Pipeline error types.

use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Required source '{name}' could not be loaded from {}: {reason}", path.display())]
    MissingRequiredSource {
        name: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("Source '{name}' has no column '{column}'")]
    MissingColumn { name: &'static str, column: String },

    #[error("Sheet '{sheet}' not found in {}", path.display())]
    MissingSheet { path: PathBuf, sheet: String },

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
