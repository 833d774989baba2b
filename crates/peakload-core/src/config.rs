//! Run configuration for the load search.
//!
//! Supports hardcoded defaults, an optional config file and
//! environment-variable overrides, in that order of precedence.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Configuration surface consumed at process start.
///
/// The search engine takes these values as given; `validate` runs at
/// load time, not inside the trial loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Candidate TPS for the first trial.
    pub start_tps: u64,

    /// Wall-clock budget for the whole run in milliseconds. 0 means
    /// unbounded.
    pub time_limit_ms: u64,

    /// Hard ceiling on the candidate TPS.
    pub max_tps: u64,

    /// Fixed worker count per trial. 0 derives the count per trial as
    /// `max(1, candidate_tps / load_per_worker)`.
    pub worker_count: u64,

    /// Transactions assigned per worker when the count is derived.
    pub load_per_worker: u64,

    /// Per-worker issue rate in transactions per second. 0 means send
    /// as fast as possible.
    pub pacing_rate: u64,

    /// Jitter half-width around `pacing_rate`. 0 disables jitter.
    pub jitter_delta: u64,

    /// Pre-open persistent channels before each worker's slice runs.
    pub pre_connect: bool,

    /// Size of the reused data-key pool.
    pub max_unique_data: u64,

    /// Generate a fresh key per transaction instead of reusing the pool.
    pub always_fresh_data: bool,

    /// Stagger window between spawning workers and the synchronized
    /// start, in milliseconds.
    pub barrier_delay_ms: u64,

    /// Longest the aggregator waits for any single worker report before
    /// failing the remainder of the trial.
    pub report_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_tps: 10,
            time_limit_ms: 0,
            max_tps: 1_000_000,
            worker_count: 1,
            load_per_worker: 100,
            pacing_rate: 200,
            jitter_delta: 0,
            pre_connect: false,
            max_unique_data: 2000,
            always_fresh_data: false,
            barrier_delay_ms: 7000,
            report_timeout_secs: 60,
        }
    }
}

impl RunConfig {
    /// Load configuration with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. ./config/peakload.{yaml,toml,json}
    /// 3. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = Self::set_defaults(builder)?;

        builder = builder.add_source(File::with_name("./config/peakload").required(false));

        // Example: PEAKLOAD_START_TPS=50
        builder = builder.add_source(Environment::with_prefix("PEAKLOAD").try_parsing(true));

        let config: RunConfig = builder.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let defaults = RunConfig::default();
        builder
            .set_default("start_tps", defaults.start_tps)?
            .set_default("time_limit_ms", defaults.time_limit_ms)?
            .set_default("max_tps", defaults.max_tps)?
            .set_default("worker_count", defaults.worker_count)?
            .set_default("load_per_worker", defaults.load_per_worker)?
            .set_default("pacing_rate", defaults.pacing_rate)?
            .set_default("jitter_delta", defaults.jitter_delta)?
            .set_default("pre_connect", defaults.pre_connect)?
            .set_default("max_unique_data", defaults.max_unique_data)?
            .set_default("always_fresh_data", defaults.always_fresh_data)?
            .set_default("barrier_delay_ms", defaults.barrier_delay_ms)?
            .set_default("report_timeout_secs", defaults.report_timeout_secs)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_tps == 0 {
            return Err(ConfigError::Message("start_tps must be > 0".to_string()));
        }

        if self.max_tps < self.start_tps {
            return Err(ConfigError::Message(
                "max_tps must be >= start_tps".to_string(),
            ));
        }

        if self.load_per_worker == 0 {
            return Err(ConfigError::Message(
                "load_per_worker must be > 0".to_string(),
            ));
        }

        if self.max_unique_data == 0 {
            return Err(ConfigError::Message(
                "max_unique_data must be > 0".to_string(),
            ));
        }

        if self.pacing_rate > 0 && self.jitter_delta >= self.pacing_rate {
            return Err(ConfigError::Message(
                "jitter_delta must be < pacing_rate".to_string(),
            ));
        }

        Ok(())
    }
}
