//! Run summary for a merge job.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::matching::{ConditionFailure, RowDecision};
use crate::models::MatchRule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairStats {
    pub source_column: String,
    pub target_column: String,
    pub rule: MatchRule,
    /// Distinct normalized values in the second dataset.
    pub index_cardinality: usize,
}

#[derive(Debug, Clone)]
pub struct MergeSummary {
    pub total_rows_file1: usize,
    pub total_rows_file2: usize,
    pub processed_rows: usize,
    pub merged_rows: usize,
    pub ambiguous_rows: usize,
    pub empty_source_rows: usize,
    pub condition_failed_rows: usize,
    pub no_intersection_rows: usize,
    pub pairs: Vec<PairStats>,
    pub merged_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub started_utc: DateTime<Utc>,
    pub ended_utc: DateTime<Utc>,
}

impl MergeSummary {
    pub fn new(total_rows_file1: usize, total_rows_file2: usize) -> Self {
        let now = Utc::now();
        Self {
            total_rows_file1,
            total_rows_file2,
            processed_rows: 0,
            merged_rows: 0,
            ambiguous_rows: 0,
            empty_source_rows: 0,
            condition_failed_rows: 0,
            no_intersection_rows: 0,
            pairs: Vec::new(),
            merged_columns: Vec::new(),
            dropped_columns: Vec::new(),
            started_utc: now,
            ended_utc: now,
        }
    }

    pub fn record(&mut self, decision: &RowDecision) {
        self.processed_rows += 1;
        match decision {
            RowDecision::Merged(r) => {
                self.merged_rows += 1;
                if r.is_ambiguous() {
                    self.ambiguous_rows += 1;
                }
            }
            RowDecision::ConditionFailed { failure, .. } => {
                self.condition_failed_rows += 1;
                if *failure == ConditionFailure::EmptySource {
                    self.empty_source_rows += 1;
                }
            }
            RowDecision::NoIntersection => self.no_intersection_rows += 1,
        }
    }

    pub fn finish(&mut self) {
        self.ended_utc = Utc::now();
    }

    pub fn duration(&self) -> Duration {
        (self.ended_utc - self.started_utc)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn unmatched_rows(&self) -> usize {
        self.condition_failed_rows + self.no_intersection_rows
    }

    /// Label/value lines, shared by the log output and the xlsx summary sheet.
    pub fn lines(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("Rows in file 1".to_string(), self.total_rows_file1.to_string()),
            ("Rows in file 2".to_string(), self.total_rows_file2.to_string()),
            ("Rows processed".to_string(), self.processed_rows.to_string()),
            ("Rows merged".to_string(), self.merged_rows.to_string()),
            (
                "Rows merged with several candidates".to_string(),
                self.ambiguous_rows.to_string(),
            ),
            (
                "Rows failing a condition".to_string(),
                self.condition_failed_rows.to_string(),
            ),
            (
                "  of which empty source value".to_string(),
                self.empty_source_rows.to_string(),
            ),
            (
                "Rows with no common match".to_string(),
                self.no_intersection_rows.to_string(),
            ),
        ];
        for (i, p) in self.pairs.iter().enumerate() {
            out.push((
                format!("Pair {}", i + 1),
                format!(
                    "{} -> {} ({}), {} distinct values",
                    p.source_column, p.target_column, p.rule, p.index_cardinality
                ),
            ));
        }
        out.push(("Merged columns".to_string(), self.merged_columns.join(", ")));
        out.push(("Dropped empty columns".to_string(), self.dropped_columns.join(", ")));
        out.push(("Started (UTC)".to_string(), self.started_utc.to_rfc3339()));
        out.push(("Ended (UTC)".to_string(), self.ended_utc.to_rfc3339()));
        out.push((
            "Duration (s)".to_string(),
            format!("{:.3}", self.duration().as_secs_f64()),
        ));
        out
    }
}
