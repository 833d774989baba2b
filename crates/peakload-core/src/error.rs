use thiserror::Error;

/// Canonical error type for the load-search engine.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Establishing a persistent channel to the target failed.
    #[error("connection setup failed: {message}")]
    Connection {
        /// Human-readable transport failure details.
        message: String,
    },

    /// A worker task died before delivering its reports.
    #[error("worker {index} was lost before reporting: {message}")]
    WorkerLost {
        /// Index of the lost worker within its trial.
        index: u64,
        /// Join failure details (panic message or cancellation).
        message: String,
    },
}

impl LoadError {
    /// Creates a `Connection` variant.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a `WorkerLost` variant.
    #[must_use]
    pub fn worker_lost(index: u64, message: impl Into<String>) -> Self {
        Self::WorkerLost {
            index,
            message: message.into(),
        }
    }
}

/// Convenient result alias for load-search operations.
pub type LoadResult<T> = Result<T, LoadError>;
