use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod sender;

use peakload_core::{Orchestrator, RunConfig, RunResult};
use sender::HttpSender;

#[derive(Parser, Debug)]
#[command(name = "peakload")]
#[command(about = "Adaptive max-TPS discovery harness", long_about = None)]
#[command(version)]
struct Cli {
    /// Target endpoint receiving the transactions
    #[arg(long, env = "PEAKLOAD_ENDPOINT")]
    endpoint: String,

    /// Candidate TPS for the first trial
    #[arg(long)]
    start_tps: Option<u64>,

    /// Wall-clock budget for the whole run in ms (0 = unbounded)
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// Hard ceiling on the candidate TPS
    #[arg(long)]
    max_tps: Option<u64>,

    /// Fixed worker count per trial (0 = derive from load-per-worker)
    #[arg(long)]
    workers: Option<u64>,

    /// Transactions per worker when the count is derived
    #[arg(long)]
    load_per_worker: Option<u64>,

    /// Per-worker issue rate in TPS (0 = send as fast as possible)
    #[arg(long)]
    pacing_rate: Option<u64>,

    /// Jitter half-width around the pacing rate (0 = disabled)
    #[arg(long)]
    jitter_delta: Option<u64>,

    /// Pre-open persistent connections before each worker's slice
    #[arg(long)]
    pre_connect: bool,

    /// Size of the reused data-key pool
    #[arg(long)]
    max_unique_data: Option<u64>,

    /// Generate a fresh data key per transaction
    #[arg(long)]
    always_fresh_data: bool,

    /// Write the run result as JSON to this path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let sender = Arc::new(HttpSender::new(&cli.endpoint)?);
    let preconnector = Arc::new(sender.preconnector());

    println!("🚀 Searching for the maximum sustainable TPS of {}", cli.endpoint);

    let orchestrator = Orchestrator::new(config, sender).with_preconnector(preconnector);
    let result = orchestrator.run().await?;

    print_results(&result);

    if let Some(output) = cli.output.as_ref() {
        std::fs::write(output, serde_json::to_string_pretty(&result)?)?;
        println!("Result written to: {}", output.display());
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<RunConfig, config::ConfigError> {
    let mut config = RunConfig::load()?;

    // CLI flags take precedence over file and environment sources
    if let Some(start_tps) = cli.start_tps {
        config.start_tps = start_tps;
    }
    if let Some(time_limit_ms) = cli.time_limit_ms {
        config.time_limit_ms = time_limit_ms;
    }
    if let Some(max_tps) = cli.max_tps {
        config.max_tps = max_tps;
    }
    if let Some(workers) = cli.workers {
        config.worker_count = workers;
    }
    if let Some(load_per_worker) = cli.load_per_worker {
        config.load_per_worker = load_per_worker;
    }
    if let Some(pacing_rate) = cli.pacing_rate {
        config.pacing_rate = pacing_rate;
    }
    if let Some(jitter_delta) = cli.jitter_delta {
        config.jitter_delta = jitter_delta;
    }
    if cli.pre_connect {
        config.pre_connect = true;
    }
    if let Some(max_unique_data) = cli.max_unique_data {
        config.max_unique_data = max_unique_data;
    }
    if cli.always_fresh_data {
        config.always_fresh_data = true;
    }

    config.validate()?;

    Ok(config)
}

fn print_results(result: &RunResult) {
    println!("====================================================================");
    println!("RESULTS");
    println!("====================================================================");
    println!("  Outcome:      {}", result.message);
    println!("  Iterations:   {}", result.iterations);
    println!("  Highest TPS:  {}", result.highest_success_tps);
    println!("  Latency:      {:.2}ms", result.latency_at_best_ms);
    println!("  Total time:   {:.1}s", result.total_elapsed_secs);
    println!("====================================================================");
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}
