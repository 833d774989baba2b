//! Per-trial accumulation of worker reports.

use tokio::time::{Duration, Instant};
use tracing::warn;

use crate::worker::ResultReport;

/// Mutable tally for one trial, owned by the orchestrator for the
/// trial's lifetime and consumed by the search controller afterwards.
#[derive(Debug, Clone)]
pub struct TrialState {
    pub candidate_tps: u64,
    pub worker_count: u64,
    pub num_success: u64,
    pub num_fail: u64,
    /// Sum of per-worker mean latencies; divide by `worker_count` for
    /// the trial figure.
    pub accumulated_latency_ms: f64,
}

impl TrialState {
    #[must_use]
    pub fn new(candidate_tps: u64, worker_count: u64) -> Self {
        Self {
            candidate_tps,
            worker_count,
            num_success: 0,
            num_fail: 0,
            accumulated_latency_ms: 0.0,
        }
    }

    /// Transactions accounted for so far; equals `candidate_tps` once
    /// the trial is complete.
    #[must_use]
    pub fn accounted(&self) -> u64 {
        self.num_success + self.num_fail
    }

    /// Trial latency: accumulated per-worker means averaged over the
    /// pool.
    #[must_use]
    pub fn mean_latency_ms(&self) -> f64 {
        self.accumulated_latency_ms / self.worker_count as f64
    }
}

/// Collects worker reports until every assigned transaction is
/// accounted for.
///
/// Completion depends only on the count reaching `candidate_tps`,
/// never on report order or identity. Timing reports feed a separate
/// skew record and do not gate completion. Reports arriving after
/// completion are a protocol violation and are dropped, never
/// double-counted.
#[derive(Debug)]
pub struct TrialAggregator {
    trial: TrialState,
    first_worker_start: Option<Instant>,
    last_worker_start: Option<Instant>,
}

impl TrialAggregator {
    #[must_use]
    pub fn new(candidate_tps: u64, worker_count: u64) -> Self {
        Self {
            trial: TrialState::new(candidate_tps, worker_count),
            first_worker_start: None,
            last_worker_start: None,
        }
    }

    /// Folds one report in; returns whether the trial is now complete.
    pub fn apply(&mut self, report: ResultReport) -> bool {
        match report {
            ResultReport::Completion {
                worker_index,
                num_success,
                num_fail,
                mean_latency_ms,
            } => {
                if self.is_complete() {
                    warn!(worker_index, "completion report after trial completion, ignoring");
                    return true;
                }
                self.trial.num_success += num_success;
                self.trial.num_fail += num_fail;
                self.trial.accumulated_latency_ms += mean_latency_ms;
            }
            ResultReport::Timing { started_at, .. } => {
                let first = self.first_worker_start.get_or_insert(started_at);
                if started_at < *first {
                    self.first_worker_start = Some(started_at);
                }
                let last = self.last_worker_start.get_or_insert(started_at);
                if started_at > *last {
                    self.last_worker_start = Some(started_at);
                }
            }
        }
        self.is_complete()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.trial.accounted() == self.trial.candidate_tps
    }

    /// Difference between the first and last observed worker start, if
    /// any timing reports arrived.
    #[must_use]
    pub fn start_skew(&self) -> Option<Duration> {
        match (self.first_worker_start, self.last_worker_start) {
            (Some(first), Some(last)) => Some(last.duration_since(first)),
            _ => None,
        }
    }

    /// Counts every still-unaccounted transaction as failed. Used when
    /// a worker never reports, so a stall degrades into a failed trial
    /// instead of hanging the run.
    pub fn fail_unaccounted(&mut self) {
        let missing = self.trial.candidate_tps - self.trial.accounted();
        if missing > 0 {
            warn!(missing, "counting unreported transactions as failures");
            self.trial.num_fail += missing;
        }
    }

    #[must_use]
    pub fn into_trial(self) -> TrialState {
        self.trial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(worker_index: u64, num_success: u64, num_fail: u64) -> ResultReport {
        ResultReport::Completion {
            worker_index,
            num_success,
            num_fail,
            mean_latency_ms: 4.0,
        }
    }

    #[test]
    fn completes_on_exact_count() {
        let mut aggregator = TrialAggregator::new(10, 2);

        assert!(!aggregator.apply(completion(0, 5, 0)));
        assert!(aggregator.apply(completion(1, 3, 2)));

        let trial = aggregator.into_trial();
        assert_eq!(trial.num_success, 8);
        assert_eq!(trial.num_fail, 2);
        assert!((trial.mean_latency_ms() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn timing_reports_never_gate_completion() {
        let mut aggregator = TrialAggregator::new(4, 2);
        let base = Instant::now();

        // Timing first is fine and changes nothing about completion
        assert!(!aggregator.apply(ResultReport::Timing {
            worker_index: 1,
            started_at: base,
            finished_at: base + Duration::from_secs(1),
        }));
        assert!(!aggregator.apply(completion(1, 2, 0)));
        assert!(!aggregator.apply(ResultReport::Timing {
            worker_index: 0,
            started_at: base + Duration::from_millis(30),
            finished_at: base + Duration::from_secs(1),
        }));
        assert!(aggregator.apply(completion(0, 2, 0)));

        assert_eq!(aggregator.start_skew(), Some(Duration::from_millis(30)));
    }

    #[test]
    fn late_completion_reports_are_dropped() {
        let mut aggregator = TrialAggregator::new(5, 1);

        assert!(aggregator.apply(completion(0, 5, 0)));
        // Protocol violation: never double-counted
        assert!(aggregator.apply(completion(0, 5, 0)));

        let trial = aggregator.into_trial();
        assert_eq!(trial.num_success, 5);
        assert_eq!(trial.accounted(), 5);
    }

    #[test]
    fn stall_escalation_fails_the_remainder() {
        let mut aggregator = TrialAggregator::new(10, 2);

        aggregator.apply(completion(0, 5, 0));
        assert!(!aggregator.is_complete());

        aggregator.fail_unaccounted();
        assert!(aggregator.is_complete());

        let trial = aggregator.into_trial();
        assert_eq!(trial.num_success, 5);
        assert_eq!(trial.num_fail, 5);
    }
}
