use std::fs::File;
use std::io::BufReader;

use csv::ReaderBuilder;

use crate::config::ImportConfig;
use crate::error::DatasetError;
use crate::models::{CellValue, Dataset};
use crate::source::{DatasetLoader, check_headers};

/// Reads a delimited file with a header row.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    pub delimiter: u8,
    pub infer_numbers: bool,
}

impl Default for CsvLoader {
    fn default() -> Self {
        Self::from_config(&ImportConfig::default())
    }
}

impl CsvLoader {
    pub fn from_config(cfg: &ImportConfig) -> Self {
        Self {
            delimiter: cfg.delimiter,
            infer_numbers: cfg.infer_numbers,
        }
    }

    pub fn read<R: std::io::Read>(&self, reader: R, path: &str) -> Result<Dataset, DatasetError> {
        let csv_err = |source| DatasetError::Csv {
            path: path.to_string(),
            source,
        };
        let mut rdr = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        check_headers(&headers, path)?;
        let mut data = Dataset::new(headers);
        for rec in rdr.records() {
            let rec = rec.map_err(csv_err)?;
            data.push_row(
                rec.iter()
                    .map(|f| CellValue::from_raw(f, self.infer_numbers))
                    .collect(),
            );
        }
        Ok(data)
    }
}

impl DatasetLoader for CsvLoader {
    fn load(&self, path: &str) -> Result<Dataset, DatasetError> {
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_string(),
            source,
        })?;
        self.read(BufReader::with_capacity(256 * 1024, file), path)
    }
}
