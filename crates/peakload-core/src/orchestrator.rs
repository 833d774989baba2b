//! Trial loop driving the throughput search.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{error, info};

use crate::aggregate::{TrialAggregator, TrialState};
use crate::config::RunConfig;
use crate::error::{LoadError, LoadResult};
use crate::pacer::RatePacer;
use crate::partition::partition;
use crate::search::{SearchState, SearchVerdict};
use crate::traits::{ConnectionEstablisher, TransactionSender};
use crate::worker::{Worker, WorkerAssignment};

/// Window after trial completion during which in-flight timing reports
/// may still land before the pool is torn down.
const REPORT_GRACE: Duration = Duration::from_millis(1000);

/// Structured outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub success: bool,
    pub message: String,
    pub iterations: u64,
    pub highest_success_tps: i64,
    pub latency_at_best_ms: f64,
    pub total_elapsed_secs: f64,
}

/// Drives trials against a transaction sender until the search
/// converges or a time/TPS ceiling stops it.
///
/// Sole owner and mutator of the search and trial state; workers only
/// ever communicate back through the per-trial report channel.
pub struct Orchestrator {
    config: RunConfig,
    sender: Arc<dyn TransactionSender>,
    preconnector: Option<Arc<dyn ConnectionEstablisher>>,
}

impl Orchestrator {
    pub fn new(config: RunConfig, sender: Arc<dyn TransactionSender>) -> Self {
        Self {
            config,
            sender,
            preconnector: None,
        }
    }

    /// Supplies the capability used to pre-open persistent channels
    /// when `pre_connect` is enabled.
    #[must_use]
    pub fn with_preconnector(mut self, preconnector: Arc<dyn ConnectionEstablisher>) -> Self {
        self.preconnector = Some(preconnector);
        self
    }

    /// Runs the full search and resolves to a structured result on
    /// every termination path.
    pub async fn run(&self) -> LoadResult<RunResult> {
        let run_start = Instant::now();
        let mut search = SearchState::new();
        let mut candidate_tps = self.config.start_tps;

        let message = loop {
            search.iterations += 1;
            info!(
                iteration = search.iterations,
                candidate_tps,
                highest_success_tps = search.highest_success_tps,
                "trial starting"
            );

            let trial = self.run_trial(candidate_tps).await?;
            info!(
                num_success = trial.num_success,
                num_fail = trial.num_fail,
                latency_ms = trial.mean_latency_ms(),
                "trial complete"
            );

            let verdict = search.evaluate(&trial);
            match verdict {
                SearchVerdict::Converged => break "Test success".to_string(),
                SearchVerdict::Continue { next_tps } => {
                    if self.time_limit_exceeded(run_start) {
                        info!("stopping: time limit reached");
                        break format!(
                            "Test stopped due to time-limit: {}s",
                            self.config.time_limit_ms / 1000
                        );
                    }
                    if next_tps <= self.config.max_tps {
                        candidate_tps = next_tps;
                    } else if search.highest_success_tps < self.config.max_tps as i64 {
                        // One final trial clamped to the ceiling itself
                        candidate_tps = self.config.max_tps;
                    } else {
                        info!("stopping: TPS ceiling reached");
                        break format!(
                            "Test stopped due to TPS-limit: {} TPS",
                            self.config.max_tps
                        );
                    }
                }
            }
        };

        Ok(RunResult {
            success: true,
            message,
            iterations: search.iterations,
            highest_success_tps: search.highest_success_tps,
            latency_at_best_ms: search.latency_at_best_ms,
            total_elapsed_secs: run_start.elapsed().as_secs_f64(),
        })
    }

    fn time_limit_exceeded(&self, run_start: Instant) -> bool {
        self.config.time_limit_ms != 0
            && run_start.elapsed() >= Duration::from_millis(self.config.time_limit_ms)
    }

    fn worker_count_for(&self, candidate_tps: u64) -> u64 {
        if self.config.worker_count != 0 {
            self.config.worker_count
        } else {
            (candidate_tps / self.config.load_per_worker).max(1)
        }
    }

    /// Executes one complete trial: spawn the pool, aggregate reports,
    /// tear everything down, hand back the tally.
    async fn run_trial(&self, candidate_tps: u64) -> LoadResult<TrialState> {
        let worker_count = self.worker_count_for(candidate_tps);
        let ranges = partition(candidate_tps, worker_count);
        let start_at = Instant::now() + Duration::from_millis(self.config.barrier_delay_ms);

        // Two report variants per worker; sized so no send ever blocks.
        let (report_tx, mut report_rx) = mpsc::channel(worker_count as usize * 2);

        let mut handles = Vec::with_capacity(ranges.len());
        for (index, range) in ranges.into_iter().enumerate() {
            let assignment = WorkerAssignment {
                candidate_tps,
                worker_count,
                worker_index: index as u64,
                range,
                start_at,
            };
            let pacer = RatePacer::new(
                self.config.pacing_rate,
                self.config.jitter_delta,
                self.config.max_unique_data,
                self.config.always_fresh_data,
            );
            let preconnector = if self.config.pre_connect {
                self.preconnector.clone()
            } else {
                None
            };
            let worker = Worker::new(
                assignment,
                pacer,
                Arc::clone(&self.sender),
                preconnector,
                report_tx.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }
        drop(report_tx);

        let mut aggregator = TrialAggregator::new(candidate_tps, worker_count);
        let report_timeout = Duration::from_secs(self.config.report_timeout_secs);
        let mut stalled = false;

        while !aggregator.is_complete() {
            match timeout(report_timeout, report_rx.recv()).await {
                Ok(Some(report)) => {
                    aggregator.apply(report);
                }
                Ok(None) => {
                    error!("report channel closed before trial completion");
                    aggregator.fail_unaccounted();
                    stalled = true;
                    break;
                }
                Err(_) => {
                    error!(
                        timeout_secs = self.config.report_timeout_secs,
                        "no worker report within timeout, failing remainder of trial"
                    );
                    aggregator.fail_unaccounted();
                    stalled = true;
                    break;
                }
            }
        }

        // Let in-flight timing reports land, then tear the pool down;
        // nothing can be counted after this point.
        sleep(REPORT_GRACE).await;
        while let Ok(report) = report_rx.try_recv() {
            aggregator.apply(report);
        }
        drop(report_rx);

        if stalled {
            for handle in &handles {
                handle.abort();
            }
            for handle in handles {
                // Cancellation and panics alike: the trial is already
                // recorded as failed.
                let _ = handle.await;
            }
        } else {
            for (index, handle) in handles.into_iter().enumerate() {
                handle
                    .await
                    .map_err(|err| LoadError::worker_lost(index as u64, err.to_string()))?;
            }
        }

        if let Some(skew) = aggregator.start_skew() {
            info!(
                skew_ms = skew.as_secs_f64() * 1000.0,
                "worker start-time skew"
            );
        }

        Ok(aggregator.into_trial())
    }
}
