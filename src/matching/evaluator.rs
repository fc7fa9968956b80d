//! Evaluates every condition for one row of the first dataset.

use std::collections::BTreeSet;
use std::fmt;

use crate::matching::index::MatchIndex;
use crate::models::{Dataset, MatchPair, MatchRule, RowId};
use crate::normalize::{fuzzy_contains, normalize_cell};

/// Second-dataset rows satisfying one condition for one first-dataset row.
pub type CandidateSet = BTreeSet<RowId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionFailure {
    /// The source cell is null or blank after trimming.
    EmptySource,
    NoExactMatch,
    NoFuzzyMatch,
}

impl fmt::Display for ConditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySource => f.write_str("empty value, condition not met"),
            Self::NoExactMatch => f.write_str("not met (no exact match)"),
            Self::NoFuzzyMatch => f.write_str("not met (no fuzzy match)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConditionResult {
    /// 1-based position of the pair in the job.
    pub pair_no: usize,
    pub value: String,
    pub rule: MatchRule,
    pub outcome: Result<CandidateSet, ConditionFailure>,
}

/// Outcome of every condition evaluated for a row. Evaluation stops at the first
/// failure, so a failed evaluation holds fewer results than there are pairs.
#[derive(Debug, Clone, Default)]
pub struct RowEvaluation {
    pub conditions: Vec<ConditionResult>,
}

impl RowEvaluation {
    pub fn failure(&self) -> Option<(usize, ConditionFailure)> {
        self.conditions
            .iter()
            .find_map(|c| c.outcome.as_ref().err().map(|e| (c.pair_no, *e)))
    }

    pub fn all_matched(&self) -> bool {
        !self.conditions.is_empty() && self.failure().is_none()
    }

    /// Borrowed candidate sets, one per pair, or the failure that stopped evaluation.
    pub fn candidate_sets(&self) -> Result<Vec<&CandidateSet>, ConditionFailure> {
        self.conditions
            .iter()
            .map(|c| c.outcome.as_ref().map_err(|e| *e))
            .collect()
    }

    pub fn into_result(self) -> Result<Vec<CandidateSet>, ConditionFailure> {
        self.conditions.into_iter().map(|c| c.outcome).collect()
    }
}

pub struct RowEvaluator<'a> {
    first: &'a Dataset,
    pairs: &'a [MatchPair],
    indexes: &'a [MatchIndex],
    source_cols: Vec<Option<usize>>,
}

impl<'a> RowEvaluator<'a> {
    pub fn new(first: &'a Dataset, pairs: &'a [MatchPair], indexes: &'a [MatchIndex]) -> Self {
        debug_assert_eq!(pairs.len(), indexes.len());
        let source_cols = pairs
            .iter()
            .map(|p| first.column_index(&p.source_column))
            .collect();
        Self {
            first,
            pairs,
            indexes,
            source_cols,
        }
    }

    pub fn evaluate(&self, row: RowId) -> RowEvaluation {
        let mut conditions = Vec::with_capacity(self.pairs.len());
        for (i, (pair, index)) in self.pairs.iter().zip(self.indexes).enumerate() {
            let value = match self.source_cols[i] {
                Some(c) => normalize_cell(self.first.cell(row, c), pair.rule),
                None => String::new(),
            };
            let outcome = lookup(&value, index);
            let failed = outcome.is_err();
            conditions.push(ConditionResult {
                pair_no: i + 1,
                value,
                rule: pair.rule,
                outcome,
            });
            if failed {
                break;
            }
        }
        RowEvaluation { conditions }
    }
}

/// Looks up a value in `index`, normalized under the same rule the index was built with.
fn lookup(value: &str, index: &MatchIndex) -> Result<CandidateSet, ConditionFailure> {
    // blank sources never match, even against blank keys in the index
    if value.is_empty() {
        return Err(ConditionFailure::EmptySource);
    }
    match index.rule() {
        MatchRule::Exact => index
            .get(value)
            .map(|rows| rows.iter().copied().collect())
            .ok_or(ConditionFailure::NoExactMatch),
        MatchRule::Fuzzy => {
            let mut set = CandidateSet::new();
            for (key, rows) in index.iter() {
                if fuzzy_contains(value, key) {
                    set.extend(rows.iter().copied());
                }
            }
            if set.is_empty() {
                Err(ConditionFailure::NoFuzzyMatch)
            } else {
                Ok(set)
            }
        }
    }
}

/// Convenience wrapper for a single evaluation.
pub fn evaluate(
    first: &Dataset,
    row: RowId,
    pairs: &[MatchPair],
    indexes: &[MatchIndex],
) -> Result<Vec<CandidateSet>, ConditionFailure> {
    RowEvaluator::new(first, pairs, indexes)
        .evaluate(row)
        .into_result()
}
