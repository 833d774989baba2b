//! Core engine for peakload: adaptive discovery of the maximum
//! zero-failure transaction throughput of a target service.
//!
//! One orchestrator runs trials at candidate TPS levels; each trial
//! partitions its transactions across a pool of workers that start on
//! a shared barrier, pace their slices against an opaque transaction
//! sender, and report outcomes back over a channel. A bounded binary
//! search over the success/fail boundary proposes the next candidate
//! until it converges.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pacer;
pub mod partition;
pub mod search;
pub mod traits;
pub mod worker;

pub use aggregate::{TrialAggregator, TrialState};
pub use config::RunConfig;
pub use error::{LoadError, LoadResult};
pub use orchestrator::{Orchestrator, RunResult};
pub use pacer::{BatchOutcome, RatePacer};
pub use partition::partition;
pub use search::{SearchState, SearchVerdict, NO_SUCCESS_TPS, UNREACHED_FAIL_TPS};
pub use traits::{ConnectionEstablisher, TransactionSender, TxOutcome};
pub use worker::{ResultReport, Worker, WorkerAssignment};
