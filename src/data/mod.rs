//! Data module - source loading, raw records and the canonical panel

pub mod loader;
pub mod panel;
pub mod records;

pub use loader::DataLoader;
pub use panel::PanelRow;
pub use records::{
    ClassificationRecord, ConflictEvent, EcommerceRecord, InternetRecord, MonthlyRecord, Parsed,
};
