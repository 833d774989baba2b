use std::time::Duration;

use async_trait::async_trait;

use crate::error::LoadResult;

/// Outcome of a single transaction as observed by the sender.
#[derive(Debug, Clone, Copy)]
pub struct TxOutcome {
    /// Whether the target accepted the transaction.
    pub success: bool,
    /// Elapsed time between issuing the transaction and its resolution.
    pub latency: Duration,
}

impl TxOutcome {
    /// Outcome for an accepted transaction.
    #[must_use]
    pub fn success(latency: Duration) -> Self {
        Self {
            success: true,
            latency,
        }
    }

    /// Outcome for a rejected or errored transaction.
    #[must_use]
    pub fn failure(latency: Duration) -> Self {
        Self {
            success: false,
            latency,
        }
    }
}

/// Transport capability invoked once per transaction.
///
/// The engine treats the transport as opaque: it hands over a data key
/// plus the trial's candidate rate and receives an outcome. Failures are
/// counted, never retried.
#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// Issues one transaction for `key` while the run is probing
    /// `candidate_tps` transactions per second.
    async fn send(&self, key: u64, candidate_tps: u64) -> TxOutcome;
}

/// Capability to pre-open a persistent channel to the target endpoint.
///
/// Only exercised when pre-connection is enabled; the engine does not
/// interpret the channel's internals.
#[async_trait]
pub trait ConnectionEstablisher: Send + Sync {
    /// Opens one persistent channel to the target.
    async fn connect(&self) -> LoadResult<()>;
}
