//! Follow the update topics of a job
//!
//! Usage:
//!   watch 3 5 4
//!   watch 3 5 4 --strategy big-to-small --endpoint tcp://10.0.0.7:9898

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use codec::Update;
use network::Endpoint;
use types::{Problem, StrategyKind};
use update_consumer::UpdateConsumer;
use worker::init_logging;
use worker_config::load_settings;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Strategy {
    SmallToBig,
    BigToSmall,
}

impl From<Strategy> for StrategyKind {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::SmallToBig => StrategyKind::SmallToBig,
            Strategy::BigToSmall => StrategyKind::BigToSmall,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "watch")]
#[command(about = "Print the steps workers publish for a bucket puzzle")]
#[command(version)]
struct Args {
    first: i32,
    second: i32,
    goal: i32,

    /// Publisher endpoint; repeat for several workers (overrides config)
    #[arg(short, long)]
    endpoint: Vec<Endpoint>,

    /// Follow a single strategy instead of all of them
    #[arg(short, long, value_enum)]
    strategy: Option<Strategy>,

    /// Seconds to wait for each update
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, false)?;
    let settings = load_settings(args.config.as_deref())?;

    let endpoints = if args.endpoint.is_empty() {
        settings.consumer.publisher_endpoints()?
    } else {
        args.endpoint.clone()
    };
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.consumer.receive_timeout());

    let problem = Problem::new(args.first, args.second, args.goal).context("Invalid problem")?;
    let kinds: Vec<StrategyKind> = match args.strategy {
        Some(strategy) => vec![strategy.into()],
        None => StrategyKind::ALL.to_vec(),
    };
    let topics: Vec<String> = kinds.iter().map(|&kind| problem.solve(kind).topic()).collect();

    let mut consumer = UpdateConsumer::connect(&endpoints, &topics)
        .await?
        .with_receive_timeout(timeout);

    while let Some(envelope) = consumer.next_update(timeout).await? {
        match &envelope.update {
            Update::Initial(step) | Update::Action(step) => println!(
                "[{}] #{} {:?} {} ({})",
                envelope.topic, step.step_number, step.action, step.actor, step.description
            ),
            Update::Completion(result) => println!(
                "[{}] done in {} steps, drew {} discharged {}",
                envelope.topic,
                result.step_count,
                result.ending_reservoir.volume_drawn,
                result.ending_reservoir.volume_discharged
            ),
            Update::Error(info) => println!("[{}] failed: {info}", envelope.topic),
        }
    }
    Ok(())
}
