use crate::models::{CellValue, MatchRule};

/// Canonical comparison form of a cell: trimmed text, case-folded under the fuzzy rule.
/// Null cells normalize to the empty string.
pub fn normalize_cell(value: &CellValue, rule: MatchRule) -> String {
    let raw = match value {
        CellValue::Null => return String::new(),
        CellValue::Text(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };
    match rule {
        MatchRule::Exact => raw,
        MatchRule::Fuzzy => raw.to_lowercase(),
    }
}

/// Bidirectional substring containment used by the fuzzy rule.
#[inline]
pub fn fuzzy_contains(source: &str, key: &str) -> bool {
    key.contains(source) || source.contains(key)
}
