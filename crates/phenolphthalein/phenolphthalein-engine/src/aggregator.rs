//! Maps each observed final state to a histogram bucket and a
//! classification.
//!
//! `Aggregator` is only ever called by the per-iteration leader, and
//! leaders are serialised by the post-barrier, so a single owner with no
//! internal synchronisation would be sound. It is still wrapped in a
//! `Mutex` by its caller (see [`crate::worker::Worker`]) rather than
//! reached through `unsafe` — under that invariant the lock is never
//! contended, so the cost is the same as an uncontended atomic swap.

use phenolphthalein_core::{Histogram, Outcome, State, total_count};

use crate::policy::CheckPolicy;

/// What the Runner should do after this observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Continue,
    /// A `--check=exit-on-*` condition fired; not an error.
    PolicyStop { triggering_state: State },
    /// `check` returned a different classification for a state already
    /// in the histogram.
    Fatal {
        state: State,
        previous_accepted: bool,
        current_accepted: bool,
    },
}

#[derive(Debug, Default)]
pub struct Aggregator {
    histogram: Histogram,
}

impl Aggregator {
    pub fn new() -> Aggregator {
        Aggregator {
            histogram: Histogram::new(),
        }
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    pub fn total(&self) -> u64 {
        total_count(&self.histogram)
    }

    /// Records one observation and returns the resulting decision.
    ///
    /// `outcome` is `Outcome::Unknown` when `check-policy=disable`; it is
    /// never compared against a prior `Unknown` for consistency (there is
    /// nothing to be inconsistent about when `check` was never called).
    pub fn observe(&mut self, state: State, outcome: Outcome, policy: CheckPolicy) -> Decision {
        match self.histogram.get(&state).copied() {
            Some((count, previous_outcome)) => {
                if previous_outcome != Outcome::Unknown
                    && outcome != Outcome::Unknown
                    && previous_outcome != outcome
                {
                    return Decision::Fatal {
                        state,
                        previous_accepted: previous_outcome == Outcome::Accepted,
                        current_accepted: outcome == Outcome::Accepted,
                    };
                }
                self.histogram
                    .insert(state.clone(), (count + 1, previous_outcome));
            }
            None => {
                self.histogram.insert(state.clone(), (1, outcome));
            }
        }

        if policy_fires(policy, outcome) {
            Decision::PolicyStop {
                triggering_state: state,
            }
        } else {
            Decision::Continue
        }
    }
}

fn policy_fires(policy: CheckPolicy, outcome: Outcome) -> bool {
    matches!(
        (policy, outcome),
        (CheckPolicy::ExitOnPass, Outcome::Accepted)
            | (CheckPolicy::ExitOnFail, Outcome::Rejected)
            | (CheckPolicy::ExitOnUnknown, Outcome::Unknown)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(x: i32) -> State {
        State {
            atomic_int32: vec![x],
            int32: vec![],
        }
    }

    #[test]
    fn first_observation_of_a_state_inserts_with_count_one() {
        let mut agg = Aggregator::new();
        let decision = agg.observe(state(1), Outcome::Accepted, CheckPolicy::Report);
        assert_eq!(decision, Decision::Continue);
        assert_eq!(agg.histogram().get(&state(1)), Some(&(1, Outcome::Accepted)));
        assert_eq!(agg.total(), 1);
    }

    #[test]
    fn repeated_observation_increments_count_without_changing_outcome() {
        let mut agg = Aggregator::new();
        agg.observe(state(1), Outcome::Rejected, CheckPolicy::Report);
        agg.observe(state(1), Outcome::Rejected, CheckPolicy::Report);
        agg.observe(state(1), Outcome::Rejected, CheckPolicy::Report);
        assert_eq!(agg.histogram().get(&state(1)), Some(&(3, Outcome::Rejected)));
        assert_eq!(agg.total(), 3);
    }

    #[test]
    fn inconsistent_outcome_for_same_state_is_fatal() {
        let mut agg = Aggregator::new();
        agg.observe(state(1), Outcome::Accepted, CheckPolicy::Report);
        let decision = agg.observe(state(1), Outcome::Rejected, CheckPolicy::Report);
        assert_eq!(
            decision,
            Decision::Fatal {
                state: state(1),
                previous_accepted: true,
                current_accepted: false,
            }
        );
    }

    #[test]
    fn exit_on_fail_stops_on_first_rejected_state() {
        let mut agg = Aggregator::new();
        let decision = agg.observe(state(1), Outcome::Rejected, CheckPolicy::ExitOnFail);
        assert_eq!(
            decision,
            Decision::PolicyStop {
                triggering_state: state(1)
            }
        );
    }

    #[test]
    fn report_policy_never_stops() {
        let mut agg = Aggregator::new();
        let decision = agg.observe(state(1), Outcome::Rejected, CheckPolicy::Report);
        assert_eq!(decision, Decision::Continue);
    }

    #[test]
    fn total_is_conserved_across_distinct_states() {
        let mut agg = Aggregator::new();
        for x in 0..5 {
            agg.observe(state(x), Outcome::Accepted, CheckPolicy::Report);
        }
        assert_eq!(agg.total(), 5);
    }
}
