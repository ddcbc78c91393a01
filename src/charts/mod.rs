//! Charts module - static PNG rendering of the clean panel

mod renderer;

pub use renderer::ChartRenderer;
