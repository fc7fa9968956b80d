//! Dataset loading from delimited text or spreadsheets. The merge core never sees file formats.

pub mod csv_source;
pub mod xlsx_source;

pub use csv_source::CsvLoader;
pub use xlsx_source::XlsxLoader;

use std::collections::HashSet;
use std::path::Path;

use crate::config::ImportConfig;
use crate::error::DatasetError;
use crate::models::Dataset;

pub trait DatasetLoader {
    fn load(&self, path: &str) -> Result<Dataset, DatasetError>;
}

/// Picks a loader from the file extension.
pub fn loader_for(path: &str, cfg: &ImportConfig) -> Result<Box<dyn DatasetLoader>, DatasetError> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" | "" => Ok(Box::new(CsvLoader::from_config(cfg))),
        "tsv" => Ok(Box::new(CsvLoader {
            delimiter: b'\t',
            ..CsvLoader::from_config(cfg)
        })),
        "xlsx" | "xlsm" | "xls" => Ok(Box::new(XlsxLoader)),
        other => Err(DatasetError::UnsupportedFormat(format!(
            "{} (.{}); expected csv, tsv, txt or xlsx",
            path, other
        ))),
    }
}

/// Header names must be unique.
pub(crate) fn check_headers(headers: &[String], path: &str) -> Result<(), DatasetError> {
    let mut seen = HashSet::new();
    for h in headers {
        if !seen.insert(h.as_str()) {
            return Err(DatasetError::DuplicateColumn {
                path: path.to_string(),
                column: h.clone(),
            });
        }
    }
    Ok(())
}

/// Column names, row count and the first rows of a dataset.
#[derive(Debug, Clone)]
pub struct DatasetInfo {
    pub path: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub preview: Dataset,
}

pub fn inspect(path: &str, cfg: &ImportConfig, preview_rows: usize) -> Result<DatasetInfo, DatasetError> {
    let data = loader_for(path, cfg)?.load(path)?;
    let preview = Dataset::from_rows(
        data.columns().to_vec(),
        data.rows().iter().take(preview_rows).cloned().collect(),
    );
    Ok(DatasetInfo {
        path: path.to_string(),
        columns: data.columns().to_vec(),
        row_count: data.len(),
        preview,
    })
}
