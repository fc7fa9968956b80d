//! Per-condition lookup from normalized target values to second-dataset rows.

use std::collections::HashMap;

use crate::models::{Dataset, MatchPair, MatchRule, RowId};
use crate::normalize::normalize_cell;

#[derive(Debug, Clone)]
pub struct MatchIndex {
    rule: MatchRule,
    // row ids are pushed in ascending order, so each list is sorted and unique
    entries: HashMap<String, Vec<RowId>>,
}

impl MatchIndex {
    /// Indexes `pair.target_column` of `second`. Column existence is the caller's concern:
    /// an unknown column reads as null everywhere and yields a single empty key.
    pub fn build(pair: &MatchPair, second: &Dataset) -> Self {
        let col = second.column_index(&pair.target_column);
        let mut entries: HashMap<String, Vec<RowId>> = HashMap::new();
        for row in 0..second.len() {
            let key = match col {
                Some(c) => normalize_cell(second.cell(row, c), pair.rule),
                None => String::new(),
            };
            entries.entry(key).or_default().push(row);
        }
        Self {
            rule: pair.rule,
            entries,
        }
    }

    pub fn rule(&self) -> MatchRule {
        self.rule
    }

    /// Number of distinct normalized values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[RowId]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RowId])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Builds one index per pair, in pair order.
pub fn build_indexes(pairs: &[MatchPair], second: &Dataset) -> Vec<MatchIndex> {
    pairs.iter().map(|p| MatchIndex::build(p, second)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn second() -> Dataset {
        Dataset::from_rows(
            vec!["key".into(), "val".into()],
            vec![
                vec!["Alpha".into(), CellValue::Int(1)],
                vec![" alpha ".into(), CellValue::Int(2)],
                vec![CellValue::Null, CellValue::Int(3)],
                vec!["Beta".into(), CellValue::Int(4)],
            ],
        )
    }

    #[test]
    fn exact_index_keeps_case() {
        let idx = MatchIndex::build(&MatchPair::new("k", "key", MatchRule::Exact), &second());
        assert_eq!(idx.len(), 4);
        assert_eq!(idx.get("Alpha"), Some(&[0][..]));
        assert_eq!(idx.get("alpha"), Some(&[1][..]));
        assert_eq!(idx.get(""), Some(&[2][..]));
    }

    #[test]
    fn fuzzy_index_folds_case() {
        let idx = MatchIndex::build(&MatchPair::new("k", "key", MatchRule::Fuzzy), &second());
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.get("alpha"), Some(&[0, 1][..]));
        assert!(idx.len() <= second().len());
    }

    #[test]
    fn missing_column_indexes_blank_keys() {
        let idx = MatchIndex::build(&MatchPair::new("k", "nope", MatchRule::Exact), &second());
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.get("").map(|r| r.len()), Some(4));
    }
}
