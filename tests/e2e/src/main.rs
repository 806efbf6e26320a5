//! End-to-End Test Runner

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use e2e_tests::{
    GoldenPathTest, PoisonMessageTest, SharedQueueTest, TestConfig, TestFramework, TestResult,
    TopicIsolationTest, UnsolvableJobTest,
};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Test scenario to run
    #[arg(short, long, default_value = "all")]
    scenario: String,

    /// Test timeout in seconds
    #[arg(short, long, default_value_t = 60)]
    timeout: u64,

    /// Output results to file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Skip cleanup after test
    #[arg(long)]
    no_cleanup: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("e2e_tests={log_level}").parse()?)
                .add_directive(format!("worker={log_level}").parse()?)
                .add_directive(format!("forwarder={log_level}").parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting E2E Test Suite");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = TestConfig {
        timeout_secs: args.timeout,
        cleanup: !args.no_cleanup,
        ..TestConfig::default()
    };
    let framework = TestFramework::new(config).await?;

    let results = match args.scenario.as_str() {
        "golden" | "golden_path" => vec![framework.run_scenario(GoldenPathTest).await],
        "isolation" | "topic_isolation" => vec![framework.run_scenario(TopicIsolationTest).await],
        "unsolvable" | "unsolvable_job" => vec![framework.run_scenario(UnsolvableJobTest).await],
        "poison" | "poison_message" => {
            vec![framework.run_scenario(PoisonMessageTest { prior_claims: 5 }).await]
        }
        "shared" | "shared_queue" => vec![framework.run_scenario(shared_queue()).await],
        "all" => {
            info!("Running all test scenarios");
            vec![
                framework.run_scenario(GoldenPathTest).await,
                framework.run_scenario(TopicIsolationTest).await,
                framework.run_scenario(UnsolvableJobTest).await,
                framework.run_scenario(PoisonMessageTest { prior_claims: 5 }).await,
                framework.run_scenario(shared_queue()).await,
            ]
        }
        _ => {
            error!("Unknown test scenario: {}", args.scenario);
            return Ok(());
        }
    };

    print_results_summary(&results);

    if let Some(output_path) = args.output {
        save_results_to_file(&results, &output_path).await?;
        info!("Results saved to: {}", output_path.display());
    }

    if !results.iter().all(|r| r.success) {
        error!("Some tests failed");
        std::process::exit(1);
    }

    info!("All tests passed successfully!");
    Ok(())
}

fn shared_queue() -> SharedQueueTest {
    SharedQueueTest {
        workers: 3,
        jobs: vec![(3, 5, 4), (2, 7, 5), (5, 11, 8), (4, 9, 6)],
    }
}

fn print_results_summary(results: &[TestResult]) {
    println!("\n═══════════════════════════════════════");
    println!("        TEST RESULTS SUMMARY");
    println!("═══════════════════════════════════════");

    let passed_tests = results.iter().filter(|r| r.success).count();
    println!("Total Tests: {}", results.len());
    println!("Passed:      {} ✓", passed_tests);
    println!("Failed:      {} ✗", results.len() - passed_tests);
    println!();

    for result in results {
        let status = if result.success { "✓ PASS" } else { "✗ FAIL" };
        println!(
            "{} {} ({} ms)",
            status,
            result.scenario_name,
            result.duration.as_millis()
        );

        if let Some(ref error) = result.error_message {
            println!("      Error: {}", error);
        }

        println!(
            "      Jobs: {} | Received: {} | Relayed: {} | Dropped: {}",
            result.metrics.jobs_submitted,
            result.metrics.updates_received,
            result.metrics.updates_relayed,
            result.metrics.updates_dropped
        );

        for validation in result.validation_results.iter().filter(|v| !v.passed) {
            println!("        - {}: {}", validation.validator, validation.message);
        }
        println!();
    }

    println!("═══════════════════════════════════════");
}

async fn save_results_to_file(results: &[TestResult], path: &PathBuf) -> Result<()> {
    let json_output = serde_json::json!({
        "test_run": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
            "total_tests": results.len(),
            "passed_tests": results.iter().filter(|r| r.success).count(),
            "failed_tests": results.iter().filter(|r| !r.success).count(),
        },
        "results": results
    });

    tokio::fs::write(path, serde_json::to_string_pretty(&json_output)?).await?;
    Ok(())
}
