//! The observed final state of an iteration, its classification, and the
//! aggregated mapping from state to classification.

use std::collections::HashMap;

/// The tuple of current values of every cell in an [`crate::environment::Environment`]
/// at the post-barrier. Compared by value equality and used as an
/// aggregation key, so field order must be stable for a given manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct State {
    pub atomic_int32: Vec<i32>,
    pub int32: Vec<i32>,
}

impl State {
    /// Builds a zeroed state sized for `n_atomic` atomic and `n_plain`
    /// non-atomic cells. Workers preallocate one of these per thread at
    /// construction and reuse it every iteration via `snapshot_into`, so
    /// the hot loop never allocates.
    pub fn sized(n_atomic: usize, n_plain: usize) -> State {
        State {
            atomic_int32: vec![0; n_atomic],
            int32: vec![0; n_plain],
        }
    }
}

/// Classification of a [`State`] by the test's `check`.
///
/// `Unknown` is reserved for a test that declines to classify; today
/// `check` is a total boolean predicate, so the engine only produces
/// `Unknown` itself, as a placeholder, when `--check=disable` skips
/// invoking `check` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Accepted,
    Rejected,
    Unknown,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::Rejected => "rejected",
            Outcome::Unknown => "unknown",
        }
    }
}

/// Accumulated mapping from observed [`State`] to `(count, outcome)`.
/// Count is monotonic across a run; the histogram's total count equals
/// the number of completed iterations whose state was observed.
pub type Histogram = HashMap<State, (u64, Outcome)>;

/// Total iteration count recorded across every bucket of `histogram`.
pub fn total_count(histogram: &Histogram) -> u64 {
    histogram.values().map(|(count, _)| *count).sum()
}
