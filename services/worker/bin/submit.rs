//! Enqueue a bucket puzzle job
//!
//! Usage:
//!   submit 3 5 4
//!   submit 3 5 4 --work-delay-ms 250 --short

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use network::SignalSender;
use tracing::{info, warn};
use types::{JobDescriptor, Problem, StrategyKind};
use worker::{init_logging, SpoolQueue, WorkQueue};
use worker_config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "submit")]
#[command(about = "Queue a bucket puzzle for the workers")]
#[command(version)]
struct Args {
    /// Capacity of the first container
    first: i32,

    /// Capacity of the second container
    second: i32,

    /// Volume to measure
    goal: i32,

    /// Delay before the worker starts solving
    #[arg(long, default_value_t = 0)]
    start_delay_ms: i32,

    /// Delay between steps; negative for none
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    work_delay_ms: i32,

    /// Encode only the three capacities
    #[arg(long)]
    short: bool,

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

    let job = JobDescriptor::new(args.first, args.second, args.goal)
        .with_delays(args.start_delay_ms, args.work_delay_ms);
    job.validate().context("Invalid job")?;
    let problem = Problem::new(job.first_capacity, job.second_capacity, job.goal_volume)
        .context("Invalid problem")?;

    let body = if args.short {
        codec::job::encode_short(&job)
    } else {
        codec::job::encode(&job)
    };

    let queue = SpoolQueue::open(&settings.worker.queue_dir, &settings.worker.queue_name).await?;
    let id = queue.enqueue(&body).await?;
    info!(id = %id, key = %problem.key(), "job queued");

    if let Some(endpoint) = settings.worker.signal_endpoint()? {
        let signal = async {
            SignalSender::connect(&endpoint).await?.send(id.clone()).await
        };
        if let Err(e) = signal.await {
            warn!(endpoint = %endpoint, error = %e, "could not wake a worker; it will find the job when it next polls");
        }
    }

    println!("queued {id}");
    for kind in StrategyKind::ALL {
        println!("{}", problem.solve(kind).topic());
    }
    Ok(())
}
