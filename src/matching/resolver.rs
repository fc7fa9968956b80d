use crate::matching::evaluator::CandidateSet;
use crate::models::RowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Smallest row id satisfying every condition.
    pub row: RowId,
    /// Size of the intersection the row was chosen from.
    pub candidates: usize,
}

impl Resolution {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates > 1
    }
}

/// Intersects the candidate sets and picks the smallest common row id.
/// Returns `None` when no row satisfies every condition, or when no sets are given.
pub fn resolve<'a, I>(sets: I) -> Option<Resolution>
where
    I: IntoIterator<Item = &'a CandidateSet>,
{
    let mut sets: Vec<&CandidateSet> = sets.into_iter().collect();
    if sets.is_empty() {
        return None;
    }
    // start from the smallest set to keep the intersection cheap
    sets.sort_by_key(|s| s.len());
    let (smallest, rest) = sets.split_first()?;
    let common: Vec<RowId> = smallest
        .iter()
        .copied()
        .filter(|id| rest.iter().all(|s| s.contains(id)))
        .collect();
    common.first().map(|&row| Resolution {
        row,
        candidates: common.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_smallest_common_row() {
        let a = CandidateSet::from([7, 3, 9]);
        let b = CandidateSet::from([9, 3, 1]);
        let r = resolve([&a, &b]).unwrap();
        assert_eq!(r.row, 3);
        assert_eq!(r.candidates, 2);
        assert!(r.is_ambiguous());
    }

    #[test]
    fn single_set_resolves_to_its_minimum() {
        let a = CandidateSet::from([4]);
        let r = resolve([&a]).unwrap();
        assert_eq!(r, Resolution { row: 4, candidates: 1 });
        assert!(!r.is_ambiguous());
    }

    #[test]
    fn disjoint_sets_do_not_resolve() {
        let a = CandidateSet::from([0, 1]);
        let b = CandidateSet::from([2, 3]);
        assert_eq!(resolve([&a, &b]), None);
    }

    #[test]
    fn order_of_sets_does_not_matter() {
        let a = CandidateSet::from([0, 2, 5, 8]);
        let b = CandidateSet::from([5, 8]);
        let c = CandidateSet::from([8, 5, 11]);
        assert_eq!(resolve([&a, &b, &c]), resolve([&c, &a, &b]));
        assert_eq!(resolve([&a, &b, &c]).map(|r| r.row), Some(5));
    }

    #[test]
    fn no_sets_no_resolution() {
        let none: Vec<&CandidateSet> = Vec::new();
        assert_eq!(resolve(none), None);
    }
}
