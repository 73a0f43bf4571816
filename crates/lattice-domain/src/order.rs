//! Partial ordering over (work-item, stage) pairs
//!
//! Used to answer "everything that happened before this point" for
//! rollback: `(x1, y1) < (x2, y2)` when the first work item ranks earlier,
//! or it is the same work item at an earlier stage. The layer axis never
//! participates.

use std::collections::HashMap;

/// Comparator over `(x, y)` pairs with a pluggable work-item ranking
///
/// By default work items compare lexicographically by identifier. When a
/// topological ranking (identifier → position) is supplied, that ranking
/// replaces string order; identifiers missing from the ranking sort as if
/// maximally late.
///
/// # Examples
///
/// ```
/// use lattice_domain::PartialOrder;
///
/// let order = PartialOrder::lexicographic();
/// assert!(order.less_than(("proj-aaa", 2), ("proj-bbb", 1)));
/// assert!(order.less_than(("proj-aaa", 1), ("proj-aaa", 2)));
/// assert!(!order.less_than(("proj-aaa", 1), ("proj-aaa", 1)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialOrder<'a> {
    ranking: Option<&'a HashMap<String, usize>>,
}

impl<'a> PartialOrder<'a> {
    /// Compare work items by plain lexicographic identifier order
    pub fn lexicographic() -> Self {
        Self { ranking: None }
    }

    /// Compare work items by an externally supplied topological ranking
    pub fn ranked(ranking: &'a HashMap<String, usize>) -> Self {
        Self {
            ranking: Some(ranking),
        }
    }

    /// Build a comparator from an optional ranking
    pub fn from_ranking(ranking: Option<&'a HashMap<String, usize>>) -> Self {
        Self { ranking }
    }

    /// Whether `x1` ranks strictly earlier than `x2`
    fn x_less(&self, x1: &str, x2: &str) -> bool {
        match self.ranking {
            Some(map) => {
                // Unranked identifiers are treated as maximally late
                let r1 = map.get(x1).copied().unwrap_or(usize::MAX);
                let r2 = map.get(x2).copied().unwrap_or(usize::MAX);
                r1 < r2
            }
            None => x1 < x2,
        }
    }

    /// Strict comparison: `a < b` in the partial order
    pub fn less_than(&self, a: (&str, u8), b: (&str, u8)) -> bool {
        let (x1, y1) = a;
        let (x2, y2) = b;
        self.x_less(x1, x2) || (x1 == x2 && y1 < y2)
    }

    /// Non-strict comparison: `a <= b` in the partial order
    pub fn less_equal(&self, a: (&str, u8), b: (&str, u8)) -> bool {
        a == b || self.less_than(a, b)
    }

    /// Whether `a` and `b` are comparable at all
    ///
    /// With a total ranking this always holds; with a ranking that assigns
    /// the same position to distinct identifiers, neither direction may
    /// hold.
    pub fn comparable(&self, a: (&str, u8), b: (&str, u8)) -> bool {
        self.less_equal(a, b) || self.less_equal(b, a)
    }
}
