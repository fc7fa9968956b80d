use calamine::{Data, Reader, open_workbook_auto};

use crate::error::DatasetError;
use crate::models::{CellValue, Dataset};
use crate::source::{DatasetLoader, check_headers};

/// Reads the first worksheet of an xlsx/xls workbook; row 1 is the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxLoader;

// whole numbers stored as floats come back as integers
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn cell_value(d: &Data) -> CellValue {
    match d {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_INT => CellValue::Int(*f as i64),
        Data::Float(f) => CellValue::Float(*f),
        Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            CellValue::from_raw(s, false)
        }
        Data::Bool(b) => CellValue::Text(b.to_string()),
    }
}

impl DatasetLoader for XlsxLoader {
    fn load(&self, path: &str) -> Result<Dataset, DatasetError> {
        let xlsx_err = |reason: String| DatasetError::Xlsx {
            path: path.to_string(),
            reason,
        };
        let mut workbook = open_workbook_auto(path).map_err(|e| xlsx_err(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| xlsx_err("workbook has no worksheets".into()))?
            .map_err(|e| xlsx_err(e.to_string()))?;
        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(h) => h.iter().map(|c| c.to_string().trim().to_string()).collect(),
            None => return Ok(Dataset::new(Vec::new())),
        };
        check_headers(&headers, path)?;
        let mut data = Dataset::new(headers);
        for row in rows {
            data.push_row(row.iter().map(cell_value).collect());
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{DatasetWriter, XlsxDatasetWriter};
    use crate::orchestrator::summary::MergeSummary;

    #[test]
    fn reads_back_written_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let path_s = path.to_string_lossy().into_owned();
        let table = Dataset::from_rows(
            vec!["id".into(), "val".into(), "ratio".into()],
            vec![
                vec!["A".into(), CellValue::Int(1), CellValue::Float(0.5)],
                vec!["b".into(), CellValue::Null, CellValue::Float(2.25)],
            ],
        );
        XlsxDatasetWriter::default()
            .write(&table, &MergeSummary::new(2, 0), &path_s)
            .unwrap();

        let d = XlsxLoader.load(&path_s).unwrap();
        assert_eq!(d.columns(), table.columns());
        assert_eq!(d.len(), 2);
        assert_eq!(d.value(0, "id"), &CellValue::from("A"));
        assert_eq!(d.value(0, "val"), &CellValue::Int(1));
        assert_eq!(d.value(0, "ratio"), &CellValue::Float(0.5));
        assert!(d.value(1, "val").is_null());
        assert_eq!(d.value(1, "ratio"), &CellValue::Float(2.25));
    }

    #[test]
    fn whole_floats_become_ints() {
        assert_eq!(cell_value(&Data::Float(3.0)), CellValue::Int(3));
        assert_eq!(cell_value(&Data::String(String::new())), CellValue::Null);
        assert_eq!(cell_value(&Data::Empty), CellValue::Null);
    }

    #[test]
    fn unreadable_workbook_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip").unwrap();
        let err = XlsxLoader.load(&path.to_string_lossy()).unwrap_err();
        assert!(matches!(err, DatasetError::Xlsx { .. }));
    }
}
