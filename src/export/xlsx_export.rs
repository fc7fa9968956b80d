use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};

use crate::error::ExportError;
use crate::export::{DatasetWriter, write_atomic};
use crate::models::{CellValue, Dataset};
use crate::orchestrator::summary::MergeSummary;

/// Data rows available below the header on one sheet.
pub const XLSX_MAX_DATA_ROWS: usize = 1_048_575;

#[derive(Debug, Clone)]
pub struct XlsxDatasetWriter {
    pub sheet_name: String,
    /// Adds a "Summary" sheet with the run statistics.
    pub with_summary: bool,
}

impl Default for XlsxDatasetWriter {
    fn default() -> Self {
        Self {
            sheet_name: "Merged".into(),
            with_summary: true,
        }
    }
}

fn xerr(e: XlsxError) -> ExportError {
    ExportError::Xlsx(e.to_string())
}

fn header_format() -> Format {
    Format::new().set_bold().set_align(FormatAlign::Center)
}

fn merged_header_format() -> Format {
    Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_background_color(Color::RGB(0xDDEBF7))
}

fn write_table(ws: &mut Worksheet, table: &Dataset) -> Result<(), ExportError> {
    let hfmt = header_format();
    let mfmt = merged_header_format();
    for (c, name) in table.columns().iter().enumerate() {
        let fmt = if name.ends_with(crate::models::MERGED_COLUMN_SUFFIX) {
            &mfmt
        } else {
            &hfmt
        };
        ws.write_string_with_format(0, c as u16, name, fmt)
            .map_err(xerr)?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        let xr = (r + 1) as u32;
        for (c, v) in row.iter().enumerate() {
            let xc = c as u16;
            match v {
                CellValue::Null => {}
                CellValue::Text(s) => {
                    ws.write_string(xr, xc, s).map_err(xerr)?;
                }
                CellValue::Int(i) => {
                    ws.write_number(xr, xc, *i as f64).map_err(xerr)?;
                }
                CellValue::Float(x) => {
                    ws.write_number(xr, xc, *x).map_err(xerr)?;
                }
            }
        }
    }
    ws.set_freeze_panes(1, 0).map_err(xerr)?;
    Ok(())
}

fn write_summary(ws: &mut Worksheet, summary: &MergeSummary) -> Result<(), ExportError> {
    let hfmt = header_format();
    ws.write_string_with_format(0, 0, "Metric", &hfmt)
        .map_err(xerr)?;
    ws.write_string_with_format(0, 1, "Value", &hfmt)
        .map_err(xerr)?;
    for (i, (label, value)) in summary.lines().iter().enumerate() {
        let r = (i + 1) as u32;
        ws.write_string(r, 0, label).map_err(xerr)?;
        ws.write_string(r, 1, value).map_err(xerr)?;
    }
    ws.set_column_width(0, 36).map_err(xerr)?;
    ws.set_column_width(1, 60).map_err(xerr)?;
    Ok(())
}

pub fn to_xlsx_bytes(
    table: &Dataset,
    summary: Option<&MergeSummary>,
    sheet_name: &str,
) -> Result<Vec<u8>, ExportError> {
    if table.len() > XLSX_MAX_DATA_ROWS {
        return Err(ExportError::Xlsx(format!(
            "{} rows exceed the xlsx sheet limit of {}; write csv instead",
            table.len(),
            XLSX_MAX_DATA_ROWS
        )));
    }
    if table.columns().len() > u16::MAX as usize {
        return Err(ExportError::Xlsx(format!(
            "{} columns exceed the xlsx sheet limit",
            table.columns().len()
        )));
    }
    let mut wb = Workbook::new();
    {
        let ws = wb.add_worksheet();
        ws.set_name(sheet_name).map_err(xerr)?;
        write_table(ws, table)?;
    }
    if let Some(s) = summary {
        let ws = wb.add_worksheet();
        ws.set_name("Summary").map_err(xerr)?;
        write_summary(ws, s)?;
    }
    wb.save_to_buffer().map_err(xerr)
}

impl DatasetWriter for XlsxDatasetWriter {
    fn write(&self, table: &Dataset, summary: &MergeSummary, path: &str) -> Result<(), ExportError> {
        let summary = self.with_summary.then_some(summary);
        let bytes = to_xlsx_bytes(table, summary, &self.sheet_name)?;
        write_atomic(path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_xlsx_basic() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("merged.xlsx");
        let t = Dataset::from_rows(
            vec!["id".into(), "val_from_file2".into()],
            vec![
                vec!["A".into(), CellValue::Int(1)],
                vec!["b".into(), CellValue::Null],
            ],
        );
        let mut summary = MergeSummary::new(2, 2);
        summary.merged_rows = 1;
        summary.finish();
        XlsxDatasetWriter::default()
            .write(&t, &summary, &out.to_string_lossy())
            .unwrap();
        let bytes = std::fs::read(&out).unwrap();
        // xlsx is a zip container
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn invalid_sheet_name_is_reported() {
        let t = Dataset::from_rows(vec!["id".into()], vec![vec!["A".into()]]);
        let err = to_xlsx_bytes(&t, None, "bad/name").unwrap_err();
        assert!(matches!(err, ExportError::Xlsx(_)));
    }
}
