use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use rampage::messaging::{BusConfig, Strategy};
use rampage::scenario::run_fan_out;
use rampage::{init_logging, BUILD_DATE, VERSION};

/// Exercise the message bus strategies with an ordered fan-out
#[derive(Parser, Debug)]
#[command(name = "rampage", version, about)]
struct Args {
    /// Bus configuration file (.json or .toml)
    #[arg(short, long, env = "RAMPAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Strategy to run, or `all`
    #[arg(short, long, default_value = "all")]
    strategy: String,

    /// Number of ordered subscribers
    #[arg(short = 'n', long, default_value_t = 4)]
    subscribers: usize,

    /// Number of messages to publish
    #[arg(short = 'k', long, default_value_t = 1_000)]
    messages: u32,

    /// Seconds to wait for asynchronous deliveries
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json)?;
    tracing::info!("rampage {} (built {})", VERSION, BUILD_DATE);

    let base = match &args.config {
        Some(path) => BusConfig::load_from_file(path)?,
        None => BusConfig::default(),
    };

    let strategies: Vec<Strategy> = if args.strategy.eq_ignore_ascii_case("all") {
        Strategy::ALL.to_vec()
    } else {
        vec![args.strategy.parse()?]
    };

    let mut failed = Vec::new();
    for strategy in strategies {
        let config = BusConfig {
            strategy,
            ..base.clone()
        };
        let report = run_fan_out(
            &config,
            args.subscribers,
            args.messages,
            Duration::from_secs(args.timeout_secs),
        )?;

        let stats = serde_json::to_string(&report.stats)?;
        if report.passed() {
            tracing::info!(
                "[{}] {} subscriber(s) x {} message(s) in order, {} ms, stats {}",
                strategy,
                report.subscribers,
                report.messages,
                report.elapsed_ms,
                stats
            );
        } else {
            tracing::error!(
                "[{}] ordering violated: {}/{} subscriber(s) ordered, {} stray, stats {}",
                strategy,
                report.ordered,
                report.subscribers,
                report.stray,
                stats
            );
            failed.push(strategy);
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("fan-out failed for: {:?}", failed);
    }
    Ok(())
}
