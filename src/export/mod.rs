pub mod csv_export;
pub mod xlsx_export;

use std::fs;
use std::path::Path;

use crate::config::OutputFormat;
use crate::error::ExportError;
use crate::models::Dataset;
use crate::orchestrator::summary::MergeSummary;

pub use csv_export::CsvDatasetWriter;
pub use xlsx_export::XlsxDatasetWriter;

pub trait DatasetWriter {
    fn write(&self, table: &Dataset, summary: &MergeSummary, path: &str) -> Result<(), ExportError>;
}

pub fn writer_for(format: OutputFormat) -> Box<dyn DatasetWriter + Send> {
    match format {
        OutputFormat::Csv => Box::new(CsvDatasetWriter),
        OutputFormat::Xlsx => Box::new(XlsxDatasetWriter::default()),
    }
}

fn io_err(path: &Path, source: std::io::Error) -> ExportError {
    ExportError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    Ok(())
}

/// Writes `bytes` next to `path` and renames into place, so readers never see a
/// half-written output and a failed write leaves any previous file untouched.
pub(crate) fn write_atomic(path: &str, bytes: &[u8]) -> Result<(), ExportError> {
    let target = Path::new(path);
    ensure_parent_dir(target)?;
    let tmp = format!("{}.tmp", path);
    let tmp_path = Path::new(&tmp);
    if let Err(e) = fs::write(tmp_path, bytes) {
        let _ = fs::remove_file(tmp_path);
        return Err(io_err(tmp_path, e));
    }
    fs::rename(tmp_path, target).map_err(|e| {
        let _ = fs::remove_file(tmp_path);
        io_err(target, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_parents_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/deeper/out.csv");
        let out_s = out.to_string_lossy().into_owned();
        write_atomic(&out_s, b"a\n1\n").unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "a\n1\n");
        assert!(!Path::new(&format!("{}.tmp", out_s)).exists());
    }
}
