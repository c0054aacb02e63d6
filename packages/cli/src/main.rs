use anyhow::{bail, Context, Result};
use clap::Parser;
use stalemate_twin::{Heuristic, ResourceSpec, SimulationConfig, SimulationReport, Simulator};
use std::fmt;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stalemate deadlock simulator
///
/// Worker threads compete for countable resources; a periodic detector
/// finds deadlocks and preempts a victim chosen by the selected heuristic.
#[derive(Parser, Debug)]
#[command(name = "stalemate", version)]
#[command(
    about = "Concurrent resource contention with deadlock detection and preemption",
    long_about = None
)]
struct Cli {
    /// Number of worker threads
    #[arg(short, long)]
    threads: usize,

    /// Resource type as name=count (repeat for each type)
    #[arg(short, long = "resource", value_name = "NAME=COUNT", required = true)]
    resources: Vec<ResourceSpec>,

    /// Seconds between deadlock checks
    #[arg(short, long, value_name = "SECS", default_value = "2", value_parser = parse_secs)]
    interval: Duration,

    /// Victim heuristic: 1-5 or max-total, max-any, min-total, min-any, linear
    #[arg(long, default_value = "max-total")]
    heuristic: Heuristic,

    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(short, long, value_name = "SECS", value_parser = parse_secs)]
    duration: Option<Duration>,

    /// Master random seed
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Upper bound of the pause between two requests, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    think_ms: u64,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn config(&self) -> Result<SimulationConfig> {
        let config = SimulationConfig::builder()
            .num_threads(self.threads)
            .resources(self.resources.iter().cloned())
            .detection_interval(self.interval)
            .heuristic(self.heuristic)
            .seed(self.seed)
            .max_think_time(Duration::from_millis(self.think_ms))
            .build()?;
        Ok(config)
    }
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{s}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("'{s}': {e}"))
}

#[derive(Debug, Clone, Copy)]
enum StopReason {
    TimeLimit,
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TimeLimit => f.write_str("time limit reached"),
            StopReason::Interrupted => f.write_str("interrupted by user"),
        }
    }
}

async fn time_limit(limit: Option<Duration>) {
    match limit {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

fn log_report(reason: StopReason, report: &SimulationReport) {
    info!("🛑 Simulation over: {}", reason);
    info!("📊 Total deadlocks: {}", report.total_deadlocks);
    match report.average_secs_between_deadlocks {
        Some(avg) => info!("⏱️  Average time between deadlocks: {:.3} s", avg),
        None => info!("⏱️  Average time between deadlocks: n/a (no deadlock occurred)"),
    }
    info!(
        preemptions = report.total_preemptions,
        cycles = report.cycles_completed,
        ticks = report.detector_ticks,
        elapsed_secs = report.elapsed_secs,
        "📈 Run totals"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config().context("Invalid simulation parameters")?;

    info!("⚡ Stalemate v{}", stalemate_twin::VERSION);
    for (i, resource) in config.resources().iter().enumerate() {
        info!("📦 r{}: {}", i, resource);
    }
    let heuristic = config.heuristic();
    info!(
        "🎯 Heuristic #{} {}: {}",
        heuristic.index(),
        heuristic,
        heuristic.description()
    );

    let sim = Simulator::new(config);
    let stop = sim.shutdown_handle();
    let mut run = tokio::task::spawn_blocking(move || sim.run());

    let reason = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            StopReason::Interrupted
        }
        () = time_limit(cli.duration) => StopReason::TimeLimit,
        finished = &mut run => {
            finished.context("Simulation task failed")?.context("Simulation failed")?;
            bail!("Simulation stopped before shutdown was requested");
        }
    };

    stop.trigger();
    let report = run
        .await
        .context("Simulation task failed")?
        .context("Simulation failed")?;

    log_report(reason, &report);

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }

    Ok(())
}
