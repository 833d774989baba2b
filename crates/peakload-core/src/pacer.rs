//! Paced transaction issue loop.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::traits::TransactionSender;

/// Per-transaction tally for one worker's slice.
#[derive(Debug, Clone, Copy)]
pub struct BatchOutcome {
    /// Transactions the target accepted.
    pub num_success: u64,
    /// Transactions the target rejected or that errored in transport.
    pub num_fail: u64,
    /// Mean latency across the slice, in milliseconds.
    pub mean_latency_ms: f64,
    /// Wall-clock end of the issue loop.
    pub finished_at: Instant,
}

/// Emits transactions over an index range at a target rate.
///
/// A rate of zero is the sentinel for "send as fast as possible". With
/// jitter enabled the effective rate is redrawn uniformly from
/// `[rate - delta, rate + delta]` before every transaction. Sends are
/// spawned rather than awaited inline, so pacing holds regardless of
/// response latency.
#[derive(Debug, Clone)]
pub struct RatePacer {
    rate: u64,
    jitter_delta: u64,
    max_unique_data: u64,
    always_fresh_data: bool,
}

impl RatePacer {
    /// Creates a pacer; `jitter_delta` must stay below `rate` when both
    /// are nonzero (enforced by config validation).
    #[must_use]
    pub fn new(rate: u64, jitter_delta: u64, max_unique_data: u64, always_fresh_data: bool) -> Self {
        Self {
            rate,
            jitter_delta,
            max_unique_data,
            always_fresh_data,
        }
    }

    /// Issues every index in `range` against `sender` and tallies the
    /// outcomes once all sends resolve.
    pub async fn run(
        &self,
        range: Range<u64>,
        candidate_tps: u64,
        sender: Arc<dyn TransactionSender>,
    ) -> BatchOutcome {
        let loop_start = Instant::now();
        let mut inflight = JoinSet::new();

        for index in range {
            let key = if self.always_fresh_data {
                index
            } else {
                index % self.max_unique_data
            };

            let sender = Arc::clone(&sender);
            inflight.spawn(async move { sender.send(key, candidate_tps).await });

            if self.rate != 0 {
                let effective_rate = self.effective_rate();
                sleep(Duration::from_secs_f64(1.0 / effective_rate as f64)).await;
            }
        }

        let finished_at = Instant::now();
        debug!(
            elapsed_secs = finished_at.duration_since(loop_start).as_secs_f64(),
            "batch loop complete"
        );

        let mut num_success = 0u64;
        let mut num_fail = 0u64;
        let mut latency_sum_ms = 0.0f64;

        while let Some(joined) = inflight.join_next().await {
            match joined {
                Ok(outcome) => {
                    if outcome.success {
                        num_success += 1;
                    } else {
                        num_fail += 1;
                    }
                    latency_sum_ms += outcome.latency.as_secs_f64() * 1000.0;
                }
                Err(err) => {
                    warn!(error = %err, "send task died, counting as failure");
                    num_fail += 1;
                }
            }
        }

        let total = num_success + num_fail;
        let mean_latency_ms = if total == 0 {
            0.0
        } else {
            latency_sum_ms / total as f64
        };

        BatchOutcome {
            num_success,
            num_fail,
            mean_latency_ms,
            finished_at,
        }
    }

    fn effective_rate(&self) -> u64 {
        if self.jitter_delta == 0 {
            return self.rate;
        }
        use rand::Rng;
        let lower = self.rate - self.jitter_delta;
        let upper = self.rate + self.jitter_delta;
        rand::thread_rng().gen_range(lower..=upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TxOutcome;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Sender that records keys and fails a configurable key set.
    struct RecordingSender {
        keys: Mutex<Vec<u64>>,
        fail_from_key: u64,
    }

    impl RecordingSender {
        fn new(fail_from_key: u64) -> Self {
            Self {
                keys: Mutex::new(Vec::new()),
                fail_from_key,
            }
        }
    }

    #[async_trait]
    impl TransactionSender for RecordingSender {
        async fn send(&self, key: u64, _candidate_tps: u64) -> TxOutcome {
            self.keys.lock().unwrap().push(key);
            let latency = Duration::from_millis(5);
            if key < self.fail_from_key {
                TxOutcome::success(latency)
            } else {
                TxOutcome::failure(latency)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unthrottled_rate_never_suspends() {
        let sender = Arc::new(RecordingSender::new(u64::MAX));
        let pacer = RatePacer::new(0, 0, 2000, false);

        let before = Instant::now();
        let outcome = pacer.run(0..25, 25, sender.clone()).await;

        // No timers fired, so virtual time never advanced
        assert_eq!(Instant::now(), before);
        assert_eq!(outcome.num_success, 25);
        assert_eq!(outcome.num_fail, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paced_rate_suspends_fixed_gap() {
        let sender = Arc::new(RecordingSender::new(u64::MAX));
        let pacer = RatePacer::new(50, 0, 2000, false);

        let before = Instant::now();
        let outcome = pacer.run(0..10, 10, sender.clone()).await;

        // 10 transactions, 1000/50 = 20ms after each one
        assert_eq!(before.elapsed(), Duration::from_millis(200));
        assert_eq!(outcome.num_success, 10);
        assert_eq!(outcome.finished_at.duration_since(before), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_reuse_bounded_pool() {
        let sender = Arc::new(RecordingSender::new(u64::MAX));
        let pacer = RatePacer::new(0, 0, 4, false);

        pacer.run(0..8, 8, sender.clone()).await;

        let mut keys = sender.keys.lock().unwrap().clone();
        keys.sort_unstable();
        assert_eq!(keys, vec![0, 0, 1, 1, 2, 2, 3, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_data_uses_raw_indices() {
        let sender = Arc::new(RecordingSender::new(u64::MAX));
        let pacer = RatePacer::new(0, 0, 4, true);

        pacer.run(4..8, 8, sender.clone()).await;

        let mut keys = sender.keys.lock().unwrap().clone();
        keys.sort_unstable();
        assert_eq!(keys, vec![4, 5, 6, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn tallies_failures_and_latency() {
        let sender = Arc::new(RecordingSender::new(6));
        let pacer = RatePacer::new(0, 0, 2000, true);

        let outcome = pacer.run(0..10, 10, sender.clone()).await;

        assert_eq!(outcome.num_success, 6);
        assert_eq!(outcome.num_fail, 4);
        assert!((outcome.mean_latency_ms - 5.0).abs() < f64::EPSILON);
    }
}
