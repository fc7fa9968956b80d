use serde::{Deserialize, Serialize};
use std::fmt;

/// 0-based ordinal of a row inside a dataset.
pub type RowId = usize;

/// Suffix appended to every column copied from the second dataset.
pub const MERGED_COLUMN_SUFFIX: &str = "_from_file2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRule {
    /// Trimmed values must be equal.
    Exact,
    /// Case-folded values match when either contains the other.
    #[default]
    Fuzzy,
}

impl MatchRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            other => Err(format!("unknown match rule '{}' (expected exact|fuzzy)", other)),
        }
    }
}

/// One join condition between a column of the first dataset and a column of the second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub source_column: String,
    pub target_column: String,
    #[serde(default)]
    pub rule: MatchRule,
}

impl MatchPair {
    pub fn new(source: &str, target: &str, rule: MatchRule) -> Self {
        Self {
            source_column: source.to_string(),
            target_column: target.to_string(),
            rule,
        }
    }
}

impl fmt::Display for MatchPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.source_column, self.target_column, self.rule
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Text(String),
    Int(i64),
    Float(f64),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Parses a raw field; empty fields become `Null`.
    pub fn from_raw(raw: &str, infer_numbers: bool) -> Self {
        if raw.is_empty() {
            return Self::Null;
        }
        if infer_numbers {
            let t = raw.trim();
            if let Ok(i) = t.parse::<i64>() {
                return Self::Int(i);
            }
            if let Ok(f) = t.parse::<f64>() {
                if f.is_finite() {
                    return Self::Float(f);
                }
            }
        }
        Self::Text(raw.to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

/// Row-major table with named columns. Every row holds exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a dataset from column names and rows; short rows are padded with nulls
    /// and long rows truncated.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, CellValue::Null);
                r
            })
            .collect();
        Self { columns, rows }
    }

    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: RowId, col: usize) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&NULL)
    }

    /// Looks a cell up by column name; unknown columns read as null.
    pub fn value(&self, row: RowId, column: &str) -> &CellValue {
        static NULL: CellValue = CellValue::Null;
        match self.column_index(column) {
            Some(c) => self.cell(row, c),
            None => &NULL,
        }
    }

    pub fn set_cell(&mut self, row: RowId, col: usize, value: CellValue) {
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *slot = value;
        }
    }

    /// Appends a column filled with nulls, or resets an existing column of that name to nulls.
    /// Returns the column position.
    pub fn ensure_null_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            for row in &mut self.rows {
                row[idx] = CellValue::Null;
            }
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(CellValue::Null);
        }
        self.columns.len() - 1
    }

    /// Removes every column whose cells are all null. Returns the removed names in order.
    pub fn drop_null_columns(&mut self) -> Vec<String> {
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|c| self.rows.iter().any(|r| !r[c].is_null()))
            .collect();
        let dropped: Vec<String> = self
            .columns
            .iter()
            .zip(&keep)
            .filter(|(_, k)| !**k)
            .map(|(name, _)| name.clone())
            .collect();
        if dropped.is_empty() {
            return dropped;
        }
        let mut it = keep.iter();
        self.columns.retain(|_| *it.next().unwrap_or(&true));
        for row in &mut self.rows {
            let mut it = keep.iter();
            row.retain(|_| *it.next().unwrap_or(&true));
        }
        dropped
    }
}

/// Name of the column that receives `column` copied from the second dataset.
pub fn merged_column_name(column: &str) -> String {
    format!("{}{}", column, MERGED_COLUMN_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ds() -> Dataset {
        Dataset::from_rows(
            vec!["id".into(), "note".into(), "empty".into()],
            vec![
                vec!["A".into(), CellValue::Null, CellValue::Null],
                vec!["b".into(), "x".into()],
            ],
        )
    }

    #[test]
    fn short_rows_are_padded() {
        let d = ds();
        assert_eq!(d.rows()[1].len(), 3);
        assert!(d.value(1, "empty").is_null());
        assert!(d.value(0, "missing").is_null());
    }

    #[test]
    fn drop_null_columns_keeps_partial_columns() {
        let mut d = ds();
        let dropped = d.drop_null_columns();
        assert_eq!(dropped, vec!["empty".to_string()]);
        assert_eq!(d.columns(), &["id".to_string(), "note".to_string()]);
        assert_eq!(d.rows()[1], vec![CellValue::from("b"), CellValue::from("x")]);
    }

    #[test]
    fn ensure_null_column_resets_existing() {
        let mut d = ds();
        let idx = d.ensure_null_column("note");
        assert_eq!(idx, 1);
        assert!(d.value(1, "note").is_null());
        let idx = d.ensure_null_column("val_from_file2");
        assert_eq!(idx, 3);
        assert_eq!(d.columns().len(), 4);
    }

    #[test]
    fn cell_from_raw_inference() {
        assert_eq!(CellValue::from_raw("", true), CellValue::Null);
        assert_eq!(CellValue::from_raw("42", true), CellValue::Int(42));
        assert_eq!(CellValue::from_raw("1.5", true), CellValue::Float(1.5));
        assert_eq!(CellValue::from_raw("007", false), CellValue::from("007"));
        assert_eq!(CellValue::from_raw("abc", true), CellValue::from("abc"));
    }

    #[test]
    fn match_rule_parse() {
        assert_eq!("Exact".parse::<MatchRule>(), Ok(MatchRule::Exact));
        assert_eq!(" fuzzy ".parse::<MatchRule>(), Ok(MatchRule::Fuzzy));
        assert!("loose".parse::<MatchRule>().is_err());
    }
}
