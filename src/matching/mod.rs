//! Multi-condition matching: index construction, per-row evaluation and
//! intersection resolution.

pub mod evaluator;
pub mod index;
pub mod resolver;

pub use evaluator::{
    CandidateSet, ConditionFailure, ConditionResult, RowEvaluation, RowEvaluator, evaluate,
};
pub use index::{MatchIndex, build_indexes};
pub use resolver::{Resolution, resolve};

use crate::models::RowId;

/// Final decision for one row of the first dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDecision {
    Merged(Resolution),
    /// Condition `pair_no` (1-based) failed; later conditions were not evaluated.
    ConditionFailed {
        pair_no: usize,
        failure: ConditionFailure,
    },
    /// Every condition matched some rows, but no single row matched all of them.
    NoIntersection,
}

impl RowDecision {
    pub fn merged_row(&self) -> Option<RowId> {
        match self {
            Self::Merged(r) => Some(r.row),
            _ => None,
        }
    }
}

/// Runs resolution over an evaluation.
pub fn decide(evaluation: &RowEvaluation) -> RowDecision {
    if let Some((pair_no, failure)) = evaluation.failure() {
        return RowDecision::ConditionFailed { pair_no, failure };
    }
    match evaluation.candidate_sets().ok().and_then(resolve) {
        Some(r) => RowDecision::Merged(r),
        None => RowDecision::NoIntersection,
    }
}

const TRACE_PREVIEW: usize = 3;

/// Multi-line, human readable trace of how a row was matched.
/// Row numbers in the trace are 1-based.
pub fn format_trace(row: RowId, evaluation: &RowEvaluation, decision: &RowDecision) -> String {
    let mut lines = vec![format!("row {}: multi-condition match", row + 1)];
    for c in &evaluation.conditions {
        lines.push(format!("  pair {}: '{}' (rule: {})", c.pair_no, c.value, c.rule));
        match &c.outcome {
            Ok(set) => {
                let preview: Vec<String> = set
                    .iter()
                    .take(TRACE_PREVIEW)
                    .map(|id| (id + 1).to_string())
                    .collect();
                let more = if set.len() > TRACE_PREVIEW { ", ..." } else { "" };
                lines.push(format!(
                    "  -> met, file2 rows [{}{}] ({} rows)",
                    preview.join(", "),
                    more,
                    set.len()
                ));
            }
            Err(f) => lines.push(format!("  -> {}", f)),
        }
    }
    match decision {
        RowDecision::Merged(r) => {
            lines.push(format!("  -> all conditions met, merged file2 row {}", r.row + 1));
            if r.is_ambiguous() {
                lines.push(format!(
                    "  -> note: {} rows satisfy every condition, using the first",
                    r.candidates
                ));
            }
        }
        RowDecision::ConditionFailed { .. } => {
            lines.push("  -> not all conditions met, not merged".to_string());
        }
        RowDecision::NoIntersection => {
            lines.push("  -> no intersection between condition matches, not merged".to_string());
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dataset, MatchPair, MatchRule};

    fn datasets() -> (Dataset, Dataset) {
        let first = Dataset::from_rows(
            vec!["name".into(), "city".into()],
            vec![
                vec!["ann".into(), "oslo".into()],
                vec!["bob".into(), "rome".into()],
            ],
        );
        let second = Dataset::from_rows(
            vec!["name".into(), "city".into()],
            vec![
                vec!["ann".into(), "rome".into()],
                vec!["bob".into(), "oslo".into()],
                vec!["ann".into(), "oslo".into()],
                vec!["ann".into(), "oslo".into()],
            ],
        );
        (first, second)
    }

    #[test]
    fn disjoint_conditions_yield_no_intersection() {
        let (first, second) = datasets();
        let pairs = vec![
            MatchPair::new("name", "name", MatchRule::Exact),
            MatchPair::new("city", "city", MatchRule::Exact),
        ];
        let idx = build_indexes(&pairs, &second);
        let ev = RowEvaluator::new(&first, &pairs, &idx);

        let e1 = ev.evaluate(1);
        let d1 = decide(&e1);
        assert_eq!(d1, RowDecision::NoIntersection);
        let trace = format_trace(1, &e1, &d1);
        assert!(trace.contains("no intersection"));
        assert!(!trace.contains("not all conditions met"));
    }

    #[test]
    fn ambiguous_match_uses_smallest_row_and_notes_it() {
        let (first, second) = datasets();
        let pairs = vec![
            MatchPair::new("name", "name", MatchRule::Exact),
            MatchPair::new("city", "city", MatchRule::Exact),
        ];
        let idx = build_indexes(&pairs, &second);
        let e0 = RowEvaluator::new(&first, &pairs, &idx).evaluate(0);
        let d0 = decide(&e0);
        assert_eq!(d0.merged_row(), Some(2));
        let trace = format_trace(0, &e0, &d0);
        assert!(trace.contains("merged file2 row 3"));
        assert!(trace.contains("2 rows satisfy every condition"));
    }

    #[test]
    fn failed_condition_is_reported_with_pair_number() {
        let (first, second) = datasets();
        let pairs = vec![
            MatchPair::new("city", "city", MatchRule::Exact),
            MatchPair::new("name", "name", MatchRule::Exact),
        ];
        let second = Dataset::from_rows(second.columns().to_vec(), vec![vec!["x".into(), "paris".into()]]);
        let idx = build_indexes(&pairs, &second);
        let e = RowEvaluator::new(&first, &pairs, &idx).evaluate(0);
        let d = decide(&e);
        assert_eq!(
            d,
            RowDecision::ConditionFailed {
                pair_no: 1,
                failure: ConditionFailure::NoExactMatch
            }
        );
        assert!(format_trace(0, &e, &d).contains("not all conditions met"));
    }
}
