//! Stats module - statistical computations

mod calculator;

pub use calculator::{ColumnSummary, Correlation, StatsCalculator, TTest, SIGNIFICANCE_THRESHOLD};
