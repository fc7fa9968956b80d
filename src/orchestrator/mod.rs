//! Merge orchestration: validation, index construction, batched row matching,
//! progress/cancellation checkpoints and output assembly.
//!
//! State machine: `Idle → Initializing → Running → {Completed, Cancelled, Failed}`.
//! The first dataset is only modified once every batch has run, so a cancelled
//! or failed job leaves no partial output behind.

pub mod summary;

use std::collections::HashSet;
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::channel::{JobChannel, JobState, LogEvent, ProgressEvent};
use crate::error::{ConfigError, MergeError};
use crate::matching::{RowDecision, RowEvaluator, build_indexes, decide, format_trace};
use crate::models::{CellValue, Dataset, MatchPair, merged_column_name};
use summary::{MergeSummary, PairStats};

/// Everything a merge needs, frozen at job start.
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub first: Dataset,
    pub second: Dataset,
    pub pairs: Vec<MatchPair>,
    /// Columns of the second dataset to copy into the first.
    pub columns: Vec<String>,
}

impl MergeJob {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pairs.is_empty() {
            return Err(ConfigError::MissingField {
                field: "match_pairs",
            });
        }
        if self.columns.is_empty() {
            return Err(ConfigError::MissingField { field: "columns" });
        }
        if self.first.is_empty() {
            return Err(ConfigError::EmptyDataset { dataset: "file1" });
        }
        if self.second.is_empty() {
            return Err(ConfigError::EmptyDataset { dataset: "file2" });
        }
        for pair in &self.pairs {
            if !self.first.has_column(&pair.source_column) {
                return Err(ConfigError::MissingColumn {
                    dataset: "file1",
                    column: pair.source_column.clone(),
                });
            }
            if !self.second.has_column(&pair.target_column) {
                return Err(ConfigError::MissingColumn {
                    dataset: "file2",
                    column: pair.target_column.clone(),
                });
            }
        }
        let mut seen = HashSet::new();
        for col in &self.columns {
            if !self.second.has_column(col) {
                return Err(ConfigError::MissingColumn {
                    dataset: "file2",
                    column: col.clone(),
                });
            }
            if !seen.insert(col.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "columns",
                    reason: format!("'{}' selected more than once", col),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum MergeOutcome {
    Completed { table: Dataset, summary: MergeSummary },
    Cancelled { processed: usize },
}

pub struct MergeOrchestrator {
    job: MergeJob,
    options: EngineConfig,
    state: JobState,
}

impl MergeOrchestrator {
    pub fn new(job: MergeJob, options: EngineConfig) -> Self {
        Self {
            job,
            options,
            state: JobState::Idle,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    fn transition(&mut self, to: JobState) {
        debug!("merge job: {} -> {}", self.state, to);
        self.state = to;
    }

    /// Runs the job to a terminal state. Configuration and runtime errors move the
    /// job to `Failed` and are reported on the log channel before being returned.
    pub fn run<C: JobChannel>(&mut self, channel: &C) -> Result<MergeOutcome, MergeError> {
        if self.state != JobState::Idle {
            return Err(MergeError::Runtime(format!(
                "merge job already ran (state: {})",
                self.state
            )));
        }
        self.transition(JobState::Initializing);
        let res = self
            .job
            .validate()
            .map_err(MergeError::from)
            .and_then(|_| self.execute(channel));
        match res {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.transition(JobState::Failed);
                channel.log(LogEvent::error(format!("error: {}", e)));
                Err(e)
            }
        }
    }

    fn execute<C: JobChannel>(&mut self, channel: &C) -> Result<MergeOutcome, MergeError> {
        let batch_size = self.options.batch_size.max(1);
        let log_every = self.options.log_every.max(1);
        let first = &self.job.first;
        let second = &self.job.second;
        let pairs = &self.job.pairs;
        let total = first.len();
        let mut summary = MergeSummary::new(total, second.len());

        channel.log(LogEvent::info(format!(
            "starting multi-condition match ({} conditions)",
            pairs.len()
        )));
        let indexes = build_indexes(pairs, second);
        for (i, (pair, index)) in pairs.iter().zip(&indexes).enumerate() {
            channel.log(LogEvent::info(format!(
                "pair {} ({} -> {}, {}): {} distinct values in file 2",
                i + 1,
                pair.source_column,
                pair.target_column,
                pair.rule,
                index.len()
            )));
            summary.pairs.push(PairStats {
                source_column: pair.source_column.clone(),
                target_column: pair.target_column.clone(),
                rule: pair.rule,
                index_cardinality: index.len(),
            });
        }
        channel.progress(ProgressEvent {
            processed: 0,
            total,
            percent: 0.0,
            eta_secs: 0,
            stage: "indexing",
        });

        // second-dataset positions of the copied columns; validated above
        let copy_cols: Vec<usize> = self
            .job
            .columns
            .iter()
            .map(|c| {
                second.column_index(c).ok_or_else(|| {
                    MergeError::Runtime(format!("column '{}' vanished from file2", c))
                })
            })
            .collect::<Result<_, _>>()?;
        let mut merged: Vec<Vec<CellValue>> = vec![vec![CellValue::Null; total]; copy_cols.len()];

        self.state = JobState::Running;
        debug!("merge job: initializing -> running");
        let evaluator = RowEvaluator::new(first, pairs, &indexes);
        let started = Instant::now();
        let mut start = 0usize;
        while start < total {
            if channel.cancel_requested() {
                return Ok(self.cancelled(channel, start));
            }
            let end = (start + batch_size).min(total);
            for row in start..end {
                let evaluation = evaluator.evaluate(row);
                let decision = decide(&evaluation);
                if let RowDecision::Merged(r) = decision {
                    for (slot, &col) in merged.iter_mut().zip(&copy_cols) {
                        slot[row] = second.cell(r.row, col).clone();
                    }
                }
                summary.record(&decision);
                if row % log_every == 0 {
                    channel.log(LogEvent::info(format_trace(row, &evaluation, &decision)));
                }
            }
            channel.progress(progress_at(end, total, started));
            start = end;
        }
        if channel.cancel_requested() {
            return Ok(self.cancelled(channel, total));
        }

        let mut table = std::mem::take(&mut self.job.first);
        for (name, values) in self.job.columns.iter().zip(merged) {
            let target = merged_column_name(name);
            let idx = table.ensure_null_column(&target);
            for (row, v) in values.into_iter().enumerate() {
                if !v.is_null() {
                    table.set_cell(row, idx, v);
                }
            }
            summary.merged_columns.push(target);
        }
        summary.dropped_columns = table.drop_null_columns();
        if !summary.dropped_columns.is_empty() {
            channel.log(LogEvent::warn(format!(
                "dropped columns with no values: {}",
                summary.dropped_columns.join(", ")
            )));
        }
        summary.finish();
        for (label, value) in summary.lines() {
            info!("{}: {}", label, value);
        }
        // per-row traces are throttled; the tally covers every row
        channel.log(LogEvent::info(format!(
            "match outcome: {} merged ({} with several candidates), {} failed a condition, {} with no common match",
            summary.merged_rows,
            summary.ambiguous_rows,
            summary.condition_failed_rows,
            summary.no_intersection_rows
        )));
        channel.log(LogEvent::info(format!(
            "merge finished: {} rows processed, {} merged (only rows meeting every condition carry merged values)",
            total, summary.merged_rows
        )));
        self.transition(JobState::Completed);
        Ok(MergeOutcome::Completed { table, summary })
    }

    fn cancelled<C: JobChannel>(&mut self, channel: &C, processed: usize) -> MergeOutcome {
        warn!("merge cancelled after {} rows", processed);
        channel.log(LogEvent::warn(format!(
            "merge cancelled after {} rows, no output written",
            processed
        )));
        self.transition(JobState::Cancelled);
        MergeOutcome::Cancelled { processed }
    }
}

fn progress_at(processed: usize, total: usize, started: Instant) -> ProgressEvent {
    let percent = if total == 0 {
        100.0
    } else {
        (processed as f32 / total as f32) * 100.0
    };
    let elapsed = started.elapsed().as_secs_f64();
    let eta_secs = if processed == 0 {
        0
    } else {
        let rate = processed as f64 / elapsed.max(1e-6);
        ((total - processed) as f64 / rate).round() as u64
    };
    ProgressEvent {
        processed,
        total,
        percent,
        eta_secs,
        stage: "matching",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::channel::Severity;
    use crate::models::MatchRule;
    use std::cell::{Cell, RefCell};

    /// Records everything; requests cancellation once `cancel_after` progress
    /// events with stage "matching" have been seen.
    #[derive(Default)]
    struct Recorder {
        progress: RefCell<Vec<ProgressEvent>>,
        logs: RefCell<Vec<LogEvent>>,
        cancel_after: Option<usize>,
        polls: Cell<usize>,
    }

    impl JobChannel for Recorder {
        fn progress(&self, event: ProgressEvent) {
            self.progress.borrow_mut().push(event);
        }
        fn log(&self, event: LogEvent) {
            self.logs.borrow_mut().push(event);
        }
        fn cancel_requested(&self) -> bool {
            self.polls.set(self.polls.get() + 1);
            match self.cancel_after {
                Some(n) => {
                    self.progress
                        .borrow()
                        .iter()
                        .filter(|p| p.stage == "matching")
                        .count()
                        >= n
                }
                None => false,
            }
        }
    }

    fn opts(batch_size: usize) -> EngineConfig {
        EngineConfig {
            batch_size,
            log_every: 10,
            ..EngineConfig::default()
        }
    }

    fn case_job(rule: MatchRule) -> MergeJob {
        MergeJob {
            first: Dataset::from_rows(vec!["id".into()], vec![vec!["A".into()], vec!["b".into()]]),
            second: Dataset::from_rows(
                vec!["key".into(), "val".into()],
                vec![
                    vec!["a".into(), CellValue::Int(1)],
                    vec!["B".into(), CellValue::Int(2)],
                ],
            ),
            pairs: vec![MatchPair::new("id", "key", rule)],
            columns: vec!["val".into()],
        }
    }

    fn completed(outcome: MergeOutcome) -> (Dataset, MergeSummary) {
        match outcome {
            MergeOutcome::Completed { table, summary } => (table, summary),
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn fuzzy_rule_merges_case_insensitively() {
        let mut orch = MergeOrchestrator::new(case_job(MatchRule::Fuzzy), opts(100));
        let rec = Recorder::default();
        let (table, summary) = completed(orch.run(&rec).unwrap());
        assert_eq!(orch.state(), JobState::Completed);
        assert_eq!(table.columns(), &["id".to_string(), "val_from_file2".to_string()]);
        assert_eq!(table.value(0, "val_from_file2"), &CellValue::Int(1));
        assert_eq!(table.value(1, "val_from_file2"), &CellValue::Int(2));
        assert_eq!(summary.merged_rows, 2);
    }

    #[test]
    fn exact_rule_mismatch_drops_null_column() {
        let mut orch = MergeOrchestrator::new(case_job(MatchRule::Exact), opts(100));
        let rec = Recorder::default();
        let (table, summary) = completed(orch.run(&rec).unwrap());
        assert_eq!(table.columns(), &["id".to_string()]);
        assert_eq!(summary.dropped_columns, vec!["val_from_file2".to_string()]);
        assert_eq!(summary.merged_rows, 0);
    }

    #[test]
    fn no_intersection_is_logged_distinctly() {
        let job = MergeJob {
            first: Dataset::from_rows(
                vec!["name".into(), "city".into()],
                vec![vec!["ann".into(), "oslo".into()]],
            ),
            second: Dataset::from_rows(
                vec!["name".into(), "city".into(), "code".into()],
                vec![
                    vec!["ann".into(), "rome".into(), "X".into()],
                    vec!["bob".into(), "oslo".into(), "Y".into()],
                ],
            ),
            pairs: vec![
                MatchPair::new("name", "name", MatchRule::Exact),
                MatchPair::new("city", "city", MatchRule::Exact),
            ],
            columns: vec!["code".into()],
        };
        let mut orch = MergeOrchestrator::new(job, opts(100));
        let rec = Recorder::default();
        let (_, summary) = completed(orch.run(&rec).unwrap());
        assert_eq!(summary.no_intersection_rows, 1);
        assert_eq!(summary.condition_failed_rows, 0);
        let logs = rec.logs.borrow();
        assert!(logs.iter().any(|l| l.message.contains("no intersection")));
        assert!(!logs.iter().any(|l| l.message.contains("not all conditions met")));
    }

    #[test]
    fn untraced_rows_are_counted_in_the_outcome_tally() {
        let job = MergeJob {
            first: Dataset::from_rows(
                vec!["name".into(), "city".into()],
                vec![
                    vec!["zed".into(), "x".into()],
                    vec!["ann".into(), "oslo".into()],
                    vec!["bob".into(), "rome".into()],
                ],
            ),
            second: Dataset::from_rows(
                vec!["name".into(), "city".into(), "code".into()],
                vec![
                    vec!["ann".into(), "oslo".into(), "A".into()],
                    vec!["ann".into(), "oslo".into(), "B".into()],
                    vec!["bob".into(), "paris".into(), "C".into()],
                    vec!["carl".into(), "rome".into(), "D".into()],
                ],
            ),
            pairs: vec![
                MatchPair::new("name", "name", MatchRule::Exact),
                MatchPair::new("city", "city", MatchRule::Exact),
            ],
            columns: vec!["code".into()],
        };
        let mut orch = MergeOrchestrator::new(job, opts(100));
        let rec = Recorder::default();
        let (table, summary) = completed(orch.run(&rec).unwrap());
        assert_eq!(table.value(1, "code_from_file2"), &CellValue::from("A"));
        assert_eq!(summary.ambiguous_rows, 1);
        assert_eq!(summary.no_intersection_rows, 1);
        assert_eq!(summary.condition_failed_rows, 1);
        let logs = rec.logs.borrow();
        // only row 1 falls on the trace interval
        assert_eq!(logs.iter().filter(|l| l.message.starts_with("row ")).count(), 1);
        assert!(logs.iter().any(|l| l.message
            == "match outcome: 1 merged (1 with several candidates), 1 failed a condition, 1 with no common match"));
    }

    #[test]
    fn empty_source_rows_never_merge() {
        let job = MergeJob {
            first: Dataset::from_rows(
                vec!["id".into()],
                vec![vec![CellValue::Null], vec!["  ".into()], vec!["x".into()]],
            ),
            second: Dataset::from_rows(
                vec!["key".into(), "val".into()],
                vec![
                    vec![CellValue::Null, "blank".into()],
                    vec!["x".into(), "hit".into()],
                ],
            ),
            pairs: vec![MatchPair::new("id", "key", MatchRule::Exact)],
            columns: vec!["val".into()],
        };
        let mut orch = MergeOrchestrator::new(job, opts(100));
        let (table, summary) = completed(orch.run(&Recorder::default()).unwrap());
        assert!(table.value(0, "val_from_file2").is_null());
        assert!(table.value(1, "val_from_file2").is_null());
        assert_eq!(table.value(2, "val_from_file2"), &CellValue::from("hit"));
        assert_eq!(summary.empty_source_rows, 2);
    }

    #[test]
    fn progress_is_cumulative_per_batch() {
        let first = Dataset::from_rows(
            vec!["id".into()],
            (0..250).map(|i| vec![CellValue::from(format!("k{}", i).as_str())]).collect(),
        );
        let second = Dataset::from_rows(
            vec!["key".into(), "val".into()],
            vec![vec!["k1".into(), CellValue::Int(1)]],
        );
        let job = MergeJob {
            first,
            second,
            pairs: vec![MatchPair::new("id", "key", MatchRule::Exact)],
            columns: vec!["val".into()],
        };
        let mut orch = MergeOrchestrator::new(job, opts(100));
        let rec = Recorder::default();
        completed(orch.run(&rec).unwrap());
        let processed: Vec<usize> = rec
            .progress
            .borrow()
            .iter()
            .filter(|p| p.stage == "matching")
            .map(|p| p.processed)
            .collect();
        assert_eq!(processed, vec![100, 200, 250]);
        // rows 0, 10, ..., 240 are traced
        let traces = rec
            .logs
            .borrow()
            .iter()
            .filter(|l| l.message.starts_with("row "))
            .count();
        assert_eq!(traces, 25);
    }

    #[test]
    fn cancel_after_first_batch_discards_output() {
        let first = Dataset::from_rows(
            vec!["id".into()],
            (0..500).map(|_| vec![CellValue::from("a")]).collect(),
        );
        let second = Dataset::from_rows(
            vec!["key".into(), "val".into()],
            vec![vec!["a".into(), CellValue::Int(1)]],
        );
        let job = MergeJob {
            first,
            second,
            pairs: vec![MatchPair::new("id", "key", MatchRule::Exact)],
            columns: vec!["val".into()],
        };
        let mut orch = MergeOrchestrator::new(job, opts(100));
        let rec = Recorder {
            cancel_after: Some(1),
            ..Recorder::default()
        };
        match orch.run(&rec).unwrap() {
            MergeOutcome::Cancelled { processed } => assert_eq!(processed, 100),
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert_eq!(orch.state(), JobState::Cancelled);
        let matching: Vec<ProgressEvent> = rec
            .progress
            .borrow()
            .iter()
            .filter(|p| p.stage == "matching")
            .copied()
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].processed, 100);
        assert_eq!(matching[0].total, 500);
    }

    #[test]
    fn missing_column_fails_before_any_row() {
        let mut job = case_job(MatchRule::Exact);
        job.pairs.push(MatchPair::new("id", "nope", MatchRule::Exact));
        let mut orch = MergeOrchestrator::new(job, opts(100));
        let rec = Recorder::default();
        let err = orch.run(&rec).unwrap_err();
        assert!(err.is_config());
        assert_eq!(orch.state(), JobState::Failed);
        assert!(rec.progress.borrow().is_empty());
        assert_eq!(rec.logs.borrow()[0].severity, Severity::Error);
    }

    #[test]
    fn empty_selection_and_empty_dataset_are_rejected() {
        let mut job = case_job(MatchRule::Exact);
        job.columns.clear();
        assert!(matches!(
            job.validate(),
            Err(ConfigError::MissingField { field: "columns" })
        ));
        let mut job = case_job(MatchRule::Exact);
        job.second = Dataset::new(vec!["key".into(), "val".into()]);
        assert!(matches!(
            job.validate(),
            Err(ConfigError::EmptyDataset { dataset: "file2" })
        ));
    }

    #[test]
    fn rerun_is_rejected_and_runs_are_idempotent() {
        let mut a = MergeOrchestrator::new(case_job(MatchRule::Fuzzy), opts(1));
        let mut b = MergeOrchestrator::new(case_job(MatchRule::Fuzzy), opts(7));
        let (ta, _) = completed(a.run(&Recorder::default()).unwrap());
        let (tb, _) = completed(b.run(&Recorder::default()).unwrap());
        assert_eq!(ta, tb);
        assert!(a.run(&Recorder::default()).is_err());
    }
}
