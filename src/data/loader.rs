//! Source Loader Module
//! Reads delimited text (Polars) and spreadsheets (calamine) into all-text
//! DataFrames, so that type coercion happens in one place and is counted.

use crate::error::{PipelineError, PipelineResult};
use calamine::{open_workbook, Data, Reader, Xlsx};
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Loads raw source tables.
pub struct DataLoader {
    file_path: PathBuf,
    sheet: Option<String>,
    columns: Option<Vec<String>>,
}

impl DataLoader {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            sheet: None,
            columns: None,
        }
    }

    /// Worksheet to read when the source is a spreadsheet; the first sheet otherwise.
    pub fn with_sheet(mut self, sheet: Option<&str>) -> Self {
        self.sheet = sheet.map(str::to_string);
        self
    }

    /// Only materialise these columns. Requested columns the source lacks are
    /// left out here and reported by [`text_column`] when a parser asks for them.
    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    fn wants(&self, column: &str) -> bool {
        self.columns
            .as_ref()
            .map_or(true, |cols| cols.iter().any(|c| c == column))
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Load the source as a DataFrame whose columns are all text.
    pub fn load(&self) -> PipelineResult<DataFrame> {
        if !self.file_path.is_file() {
            return Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", self.file_path.display()),
            )));
        }

        let df = if self.is_spreadsheet() {
            self.load_xlsx()?
        } else {
            self.load_csv()?
        };

        log::debug!(
            "loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            self.file_path.display()
        );
        Ok(df)
    }

    fn is_spreadsheet(&self) -> bool {
        self.file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "xlsx" | "xlsm" | "xls"))
            .unwrap_or(false)
    }

    fn load_csv(&self) -> PipelineResult<DataFrame> {
        // A zero-length inference window reads every column as String
        let mut lf = LazyCsvReader::new(&self.file_path)
            .with_infer_schema_length(Some(0))
            .with_has_header(true)
            .finish()?;
        if self.columns.is_some() {
            let schema = lf.collect_schema()?;
            let selected: Vec<Expr> = schema
                .iter_names()
                .filter(|name| self.wants(name.as_str()))
                .map(|name| col(name.clone()))
                .collect();
            lf = lf.select(selected);
        }
        Ok(lf.collect()?)
    }

    fn load_xlsx(&self) -> PipelineResult<DataFrame> {
        let mut workbook: Xlsx<_> = open_workbook(&self.file_path)?;

        let range = match &self.sheet {
            Some(sheet) => {
                if !workbook.sheet_names().iter().any(|s| s == sheet) {
                    return Err(PipelineError::MissingSheet {
                        path: self.file_path.clone(),
                        sheet: sheet.clone(),
                    });
                }
                workbook.worksheet_range(sheet)?
            }
            None => workbook
                .worksheet_range_at(0)
                .ok_or_else(|| PipelineError::MissingSheet {
                    path: self.file_path.clone(),
                    sheet: "<first sheet>".to_string(),
                })??,
        };

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(DataFrame::empty());
        };

        // (sheet column index, name) of the columns kept
        let kept: Vec<(usize, String)> = header
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell_text(cell) {
                Some(name) => (i, name),
                None => (i, format!("column_{i}")),
            })
            .filter(|(_, name)| self.wants(name))
            .collect();

        let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); kept.len()];
        for row in rows {
            for ((i, _), column) in kept.iter().zip(values.iter_mut()) {
                column.push(row.get(*i).and_then(cell_text));
            }
        }
        let names = kept.into_iter().map(|(_, name)| name);

        let columns: Vec<Column> = names
            .zip(values)
            .map(|(name, vals)| Column::new(name.into(), vals))
            .collect();

        Ok(DataFrame::new(columns)?)
    }
}

/// Render a spreadsheet cell as the text a CSV export would carry.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Data::Int(i) => Some(i.to_string()),
        // f64 Display drops a trailing ".0", so whole years stay parseable as integers
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Extract a text column, trimming values and treating blanks as missing.
pub fn text_column(
    df: &DataFrame,
    source: &'static str,
    name: &str,
) -> PipelineResult<Vec<Option<String>>> {
    let column = df.column(name).map_err(|_| PipelineError::MissingColumn {
        name: source,
        column: name.to_string(),
    })?;
    let text = column.cast(&DataType::String)?;
    let values = text
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect();
    Ok(values)
}
