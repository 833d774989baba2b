//! Adaptive throughput search.
//!
//! An asymmetric binary search over candidate TPS: aggressive doubling
//! while the region below the known failure boundary is unexplored,
//! true bisection once a failure has bracketed the interval.

use crate::aggregate::TrialState;

/// Sentinel below any valid TPS: no fully-successful trial recorded yet.
pub const NO_SUCCESS_TPS: i64 = -1;

/// Sentinel above any practically reachable TPS: no failure seen yet.
pub const UNREACHED_FAIL_TPS: i64 = 1_000_000_000_000;

/// Decision returned after consuming a completed trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchVerdict {
    /// Run another trial at the proposed candidate.
    Continue { next_tps: u64 },
    /// The search found nothing better than what is already recorded.
    Converged,
}

/// Search bounds carried across trials within one run.
///
/// `highest_success_tps` only ever rises and `lowest_fail_tps` only
/// ever falls; once both leave their sentinels the interval
/// `(highest_success_tps, lowest_fail_tps)` brackets the sustainable
/// maximum and keeps shrinking.
#[derive(Debug, Clone)]
pub struct SearchState {
    /// Highest candidate that fully succeeded, or on partial failure
    /// the highest success count ever observed.
    pub highest_success_tps: i64,
    /// Lowest candidate at which at least one transaction failed.
    pub lowest_fail_tps: i64,
    /// Latency recorded at the trial that set `highest_success_tps`.
    pub latency_at_best_ms: f64,
    /// Trials executed so far.
    pub iterations: u64,
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            highest_success_tps: NO_SUCCESS_TPS,
            lowest_fail_tps: UNREACHED_FAIL_TPS,
            latency_at_best_ms: 0.0,
            iterations: 0,
        }
    }

    /// Consumes a completed trial, updates the bounds and proposes the
    /// next candidate or signals convergence.
    pub fn evaluate(&mut self, trial: &TrialState) -> SearchVerdict {
        let candidate = trial.candidate_tps as i64;

        if trial.num_fail == 0 {
            if candidate > self.highest_success_tps {
                self.highest_success_tps = candidate;
                self.latency_at_best_ms = trial.mean_latency_ms();
            }
            let next = if candidate * 2 < self.lowest_fail_tps {
                candidate * 2
            } else {
                (candidate + self.lowest_fail_tps) / 2
            };
            return SearchVerdict::Continue {
                next_tps: clamp_candidate(next),
            };
        }

        if candidate < self.lowest_fail_tps {
            self.lowest_fail_tps = candidate;
        }

        // A partial success above the recorded floor is itself an
        // achieved throughput: promote it and keep probing between it
        // and the rate that just failed.
        let achieved = trial.num_success as i64;
        if achieved > self.highest_success_tps {
            self.highest_success_tps = achieved;
            self.latency_at_best_ms = trial.mean_latency_ms();
            let next = (self.highest_success_tps + candidate) / 2;
            return SearchVerdict::Continue {
                next_tps: clamp_candidate(next),
            };
        }

        SearchVerdict::Converged
    }
}

/// A zero-transaction trial would complete vacuously and freeze the
/// search, so proposals never drop below one.
fn clamp_candidate(next: i64) -> u64 {
    next.max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(candidate_tps: u64, num_success: u64, num_fail: u64) -> TrialState {
        TrialState {
            candidate_tps,
            worker_count: 1,
            num_success,
            num_fail,
            accumulated_latency_ms: 12.0,
        }
    }

    #[test]
    fn doubles_while_no_failure_is_known() {
        let mut state = SearchState::new();

        let verdict = state.evaluate(&trial(100, 100, 0));

        assert_eq!(verdict, SearchVerdict::Continue { next_tps: 200 });
        assert_eq!(state.highest_success_tps, 100);
        assert_eq!(state.lowest_fail_tps, UNREACHED_FAIL_TPS);
        assert!((state.latency_at_best_ms - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bisects_once_a_failure_brackets_the_interval() {
        let mut state = SearchState::new();
        state.lowest_fail_tps = 500;

        let verdict = state.evaluate(&trial(300, 300, 0));

        assert_eq!(verdict, SearchVerdict::Continue { next_tps: 400 });
    }

    #[test]
    fn partial_success_above_floor_is_promoted() {
        let mut state = SearchState::new();

        let verdict = state.evaluate(&trial(400, 350, 50));

        assert_eq!(state.lowest_fail_tps, 400);
        assert_eq!(state.highest_success_tps, 350);
        assert_eq!(verdict, SearchVerdict::Continue { next_tps: 375 });
    }

    #[test]
    fn partial_success_below_floor_converges() {
        let mut state = SearchState::new();
        state.highest_success_tps = 360;

        let verdict = state.evaluate(&trial(400, 350, 50));

        assert_eq!(verdict, SearchVerdict::Converged);
        assert_eq!(state.lowest_fail_tps, 400);
        // The floor is untouched by a worse trial
        assert_eq!(state.highest_success_tps, 360);
    }

    #[test]
    fn proposal_never_drops_to_zero() {
        let mut state = SearchState::new();

        // Everything fails at the lowest possible rate
        let verdict = state.evaluate(&trial(1, 0, 1));

        assert_eq!(state.highest_success_tps, 0);
        assert_eq!(state.lowest_fail_tps, 1);
        assert_eq!(verdict, SearchVerdict::Continue { next_tps: 1 });
    }

    #[test]
    fn bounds_stay_monotonic_and_bracketed() {
        let mut state = SearchState::new();
        let mut prior_high = state.highest_success_tps;
        let mut prior_low = state.lowest_fail_tps;

        // A plausible run against a service that saturates near 500
        let outcomes = [
            trial(10, 10, 0),
            trial(20, 20, 0),
            trial(40, 40, 0),
            trial(80, 80, 0),
            trial(160, 160, 0),
            trial(320, 320, 0),
            trial(640, 500, 140),
            trial(570, 500, 70),
        ];

        for outcome in &outcomes {
            state.evaluate(outcome);

            assert!(state.highest_success_tps >= prior_high);
            assert!(state.lowest_fail_tps <= prior_low);
            if state.highest_success_tps != NO_SUCCESS_TPS
                && state.lowest_fail_tps != UNREACHED_FAIL_TPS
            {
                assert!(state.highest_success_tps < state.lowest_fail_tps);
            }
            prior_high = state.highest_success_tps;
            prior_low = state.lowest_fail_tps;
        }

        assert_eq!(state.highest_success_tps, 500);
        assert_eq!(state.lowest_fail_tps, 570);
    }
}
