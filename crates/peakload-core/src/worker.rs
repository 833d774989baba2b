//! Trial workers: one isolated execution unit per partitioned slice.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::pacer::RatePacer;
use crate::traits::{ConnectionEstablisher, TransactionSender};

/// Immutable description of one worker's share of a trial.
#[derive(Debug, Clone)]
pub struct WorkerAssignment {
    /// Total throughput level under test this trial.
    pub candidate_tps: u64,
    /// Number of workers participating in the trial.
    pub worker_count: u64,
    /// This worker's 0-based index; the last worker is `worker_count - 1`.
    pub worker_index: u64,
    /// Transaction indices this worker issues (end exclusive).
    pub range: Range<u64>,
    /// Shared deadline no worker may issue load before.
    pub start_at: Instant,
}

/// Message from a worker to the orchestrator. Immutable once sent; a
/// worker emits each variant at most once per trial, in either order.
#[derive(Debug, Clone)]
pub enum ResultReport {
    /// Aggregate outcome of the worker's slice.
    Completion {
        worker_index: u64,
        num_success: u64,
        num_fail: u64,
        mean_latency_ms: f64,
    },
    /// Observed start/end timestamps, used only for skew diagnostics.
    Timing {
        worker_index: u64,
        started_at: Instant,
        finished_at: Instant,
    },
}

/// Executes exactly one assignment and terminates after reporting.
pub struct Worker {
    assignment: WorkerAssignment,
    pacer: RatePacer,
    sender: Arc<dyn TransactionSender>,
    preconnector: Option<Arc<dyn ConnectionEstablisher>>,
    reports: mpsc::Sender<ResultReport>,
}

impl Worker {
    pub fn new(
        assignment: WorkerAssignment,
        pacer: RatePacer,
        sender: Arc<dyn TransactionSender>,
        preconnector: Option<Arc<dyn ConnectionEstablisher>>,
        reports: mpsc::Sender<ResultReport>,
    ) -> Self {
        Self {
            assignment,
            pacer,
            sender,
            preconnector,
            reports,
        }
    }

    pub async fn run(self) {
        let started_at = Instant::now();
        let assignment = &self.assignment;

        debug!(
            worker_index = assignment.worker_index,
            start = assignment.range.start,
            end = assignment.range.end,
            "worker starting"
        );

        if let Some(preconnector) = &self.preconnector {
            for _ in assignment.range.clone() {
                if let Err(err) = preconnector.connect().await {
                    warn!(
                        worker_index = assignment.worker_index,
                        error = %err,
                        "pre-connection failed"
                    );
                }
            }
        }

        // Coarse start barrier: skew across workers is measured via the
        // timing report, not eliminated here.
        while Instant::now() < assignment.start_at {
            sleep(Duration::from_millis(1)).await;
        }

        let outcome = self
            .pacer
            .run(
                assignment.range.clone(),
                assignment.candidate_tps,
                Arc::clone(&self.sender),
            )
            .await;

        // A closed channel means the trial was already torn down; the
        // aggregator side discards anything late, so drop silently.
        let _ = self
            .reports
            .send(ResultReport::Completion {
                worker_index: assignment.worker_index,
                num_success: outcome.num_success,
                num_fail: outcome.num_fail,
                mean_latency_ms: outcome.mean_latency_ms,
            })
            .await;
        let _ = self
            .reports
            .send(ResultReport::Timing {
                worker_index: assignment.worker_index,
                started_at,
                finished_at: outcome.finished_at,
            })
            .await;
    }
}
