use csv::WriterBuilder;

use crate::error::ExportError;
use crate::export::{DatasetWriter, write_atomic};
use crate::models::Dataset;
use crate::orchestrator::summary::MergeSummary;

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDatasetWriter;

/// Serializes the table with a header row; nulls become empty fields.
pub fn to_csv_bytes(table: &Dataset) -> Result<Vec<u8>, ExportError> {
    let mut w = WriterBuilder::new().from_writer(Vec::with_capacity(64 * 1024));
    w.write_record(table.columns())
        .map_err(|e| ExportError::Csv(e.to_string()))?;
    let mut record: Vec<String> = Vec::with_capacity(table.columns().len());
    for row in table.rows() {
        record.clear();
        record.extend(row.iter().map(|v| v.to_string()));
        w.write_record(&record)
            .map_err(|e| ExportError::Csv(e.to_string()))?;
    }
    w.into_inner().map_err(|e| ExportError::Csv(e.to_string()))
}

impl DatasetWriter for CsvDatasetWriter {
    fn write(&self, table: &Dataset, _summary: &MergeSummary, path: &str) -> Result<(), ExportError> {
        let bytes = to_csv_bytes(table)?;
        write_atomic(path, &bytes)
    }
}
