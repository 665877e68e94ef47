//! Overlap predicates between two intervals.
//!
//! All predicates take the intervals as `(s1, e1)` and `(s2, e2)` with
//! 0-based half-open coordinates.  Containment compares the endpoints
//! directly, so a zero-length interval at the border of another interval is
//! contained in it but does not overlap it.

/// Returns `true` if there is any overlap between the two intervals.
pub fn any_overlap(s1: i64, e1: i64, s2: i64, e2: i64) -> bool {
    s1 < e2 && s2 < e1
}

/// Returns `true` if interval 1 completely overlaps interval 2, that is
/// interval 2 is contained in interval 1.
pub fn complete_overlap(s1: i64, e1: i64, s2: i64, e2: i64) -> bool {
    s1 <= s2 && e2 <= e1
}

/// Returns `true` if interval 1 is contained in interval 2.
pub fn complete_included(s1: i64, e1: i64, s2: i64, e2: i64) -> bool {
    s2 <= s1 && e1 <= e2
}

/// Length of the intersection, only meaningful if `any_overlap` holds.
fn overlap_len(s1: i64, e1: i64, s2: i64, e2: i64) -> i64 {
    std::cmp::min(e1, e2) - std::cmp::max(s1, s2)
}

/// Returns `true` if interval 1 covers at least 50% of interval 2.
///
/// A zero-length interval 2 passes whenever the intervals overlap at all.
pub fn percent50(s1: i64, e1: i64, s2: i64, e2: i64) -> bool {
    if !any_overlap(s1, e1, s2, e2) {
        return false;
    }
    let len2 = e2 - s2;
    len2 == 0 || 2 * overlap_len(s1, e1, s2, e2) >= len2
}

/// Returns `true` if the overlap is at least 50% of the longer interval.
pub fn reciprocal50(s1: i64, e1: i64, s2: i64, e2: i64) -> bool {
    if !any_overlap(s1, e1, s2, e2) {
        return false;
    }
    let longer = std::cmp::max(e1 - s1, e2 - s2);
    2 * overlap_len(s1, e1, s2, e2) >= longer
}

/// The overlap relation to use in a region query.
///
/// The query interval is always passed as interval 1, the stored element as
/// interval 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Overlap {
    /// Any overlap between query and element.
    Any,
    /// Element contained in the query.
    Complete,
    /// Query contained in the element.
    Included,
    /// Query covers at least half of the element.
    Percent50,
    /// Overlap covers at least half of the longer of the two.
    Reciprocal50,
}

impl Overlap {
    /// Evaluate the relation for query `(s1, e1)` and element `(s2, e2)`.
    pub fn matches(self, s1: i64, e1: i64, s2: i64, e2: i64) -> bool {
        match self {
            Overlap::Any => any_overlap(s1, e1, s2, e2),
            Overlap::Complete => complete_overlap(s1, e1, s2, e2),
            Overlap::Included => complete_included(s1, e1, s2, e2),
            Overlap::Percent50 => percent50(s1, e1, s2, e2),
            Overlap::Reciprocal50 => reciprocal50(s1, e1, s2, e2),
        }
    }
}

/// Selection of the overlap function used for CNV/boundary hits.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BoundaryOverlap {
    /// The CNV must contain the boundary completely.
    #[default]
    Complete,
    /// Any overlap between CNV and boundary.
    Any,
    /// The CNV must cover at least 50% of the boundary.
    Percent50,
}

impl From<BoundaryOverlap> for Overlap {
    fn from(val: BoundaryOverlap) -> Self {
        match val {
            BoundaryOverlap::Complete => Overlap::Complete,
            BoundaryOverlap::Any => Overlap::Any,
            BoundaryOverlap::Percent50 => Overlap::Percent50,
        }
    }
}
