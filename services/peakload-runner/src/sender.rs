//! HTTP transaction transport for the runner.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use peakload_core::{ConnectionEstablisher, LoadError, LoadResult, TransactionSender, TxOutcome};

/// Issues one POST per transaction against the target endpoint.
///
/// Any non-2xx status or transport error counts as a failed
/// transaction; nothing is retried.
pub struct HttpSender {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSender {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Warm-up capability sharing this sender's connection pool.
    #[must_use]
    pub fn preconnector(&self) -> HttpPreconnector {
        HttpPreconnector {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

#[async_trait]
impl TransactionSender for HttpSender {
    async fn send(&self, key: u64, candidate_tps: u64) -> TxOutcome {
        let payload = serde_json::json!({
            "key": key,
            "rate": candidate_tps,
        });

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await;
        let latency = started.elapsed();

        match response {
            Ok(response) if response.status().is_success() => TxOutcome::success(latency),
            _ => TxOutcome::failure(latency),
        }
    }
}

/// Pre-opens persistent channels by driving keep-alive requests through
/// the shared client pool.
pub struct HttpPreconnector {
    client: reqwest::Client,
    endpoint: String,
}

#[async_trait]
impl ConnectionEstablisher for HttpPreconnector {
    async fn connect(&self) -> LoadResult<()> {
        self.client
            .head(&self.endpoint)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| LoadError::connection(err.to_string()))
    }
}
