//! Core E2E testing framework
//!
//! Every scenario gets workers that share one spool queue under the test's
//! data directory. Each worker runs its own forwarder on an ephemeral TCP
//! port and listens for wake signals on another.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use forwarder::{ForwarderBridge, ForwarderConfig, ForwarderHandle, ForwarderStats};
use network::{Endpoint, SignalSender, WakeSignal};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use update_consumer::UpdateConsumer;
use uuid::Uuid;
use worker::{DispatcherConfig, SpoolQueue, WorkQueue, WorkerDispatcher};

pub const QUEUE_NAME: &str = "jobs";
pub const DEAD_LETTER_QUEUE: &str = "jobs-poison";

/// Main test framework coordinator
pub struct TestFramework {
    config: TestConfig,
    test_id: Uuid,
    queue: Arc<SpoolQueue>,
    dead_letter: Arc<SpoolQueue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    /// Upper bound on any scenario's own timeout, in seconds
    pub timeout_secs: u64,

    /// Remove the data directory when the framework is dropped
    pub cleanup: bool,

    /// Root for per-test queue directories
    pub data_dir: PathBuf,

    /// How long to wait for each update
    pub receive_timeout_ms: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            cleanup: true,
            data_dir: PathBuf::from("/tmp/buckets_e2e_tests"),
            receive_timeout_ms: 10_000,
        }
    }
}

/// Test scenario trait
#[async_trait::async_trait]
pub trait TestScenario {
    async fn execute(&self, framework: &TestFramework) -> Result<TestResult>;

    fn name(&self) -> &str;
    fn description(&self) -> &str;

    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestResult {
    pub scenario_name: String,
    pub success: bool,
    pub duration: Duration,
    pub error_message: Option<String>,
    pub metrics: TestMetrics,
    pub validation_results: Vec<ValidationResult>,
}

impl TestResult {
    /// Result whose success is the conjunction of `validations`
    pub fn from_validations(
        scenario_name: &str,
        metrics: TestMetrics,
        validation_results: Vec<ValidationResult>,
    ) -> Self {
        Self {
            scenario_name: scenario_name.to_string(),
            success: validation_results.iter().all(|v| v.passed),
            duration: Duration::ZERO,
            error_message: None,
            metrics,
            validation_results,
        }
    }

    fn failed(scenario_name: &str, message: String) -> Self {
        Self {
            scenario_name: scenario_name.to_string(),
            error_message: Some(message),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestMetrics {
    pub jobs_submitted: u64,
    pub updates_received: u64,
    pub updates_relayed: u64,
    pub updates_dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub validator: String,
    pub passed: bool,
    pub message: String,
}

impl ValidationResult {
    pub fn check(validator: &str, passed: bool, message: impl Into<String>) -> Self {
        Self {
            validator: validator.to_string(),
            passed,
            message: message.into(),
        }
    }

    pub fn expect_eq<T: PartialEq + std::fmt::Debug>(validator: &str, expected: T, actual: T) -> Self {
        let passed = expected == actual;
        let message = if passed {
            format!("{actual:?}")
        } else {
            format!("expected {expected:?}, got {actual:?}")
        };
        Self::check(validator, passed, message)
    }
}

/// One worker process worth of components, in-process
pub struct WorkerHandle {
    pub name: String,
    forwarder: ForwarderHandle,
    signal_endpoint: Endpoint,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<worker::Result<()>>,
}

impl WorkerHandle {
    pub fn publish_endpoint(&self) -> &Endpoint {
        self.forwarder.backend_endpoint()
    }

    pub fn signal_endpoint(&self) -> &Endpoint {
        &self.signal_endpoint
    }

    pub fn stats(&self) -> ForwarderStats {
        self.forwarder.stats()
    }

    /// Stop the dispatcher loop, then the forwarder
    pub async fn stop(self) -> Result<()> {
        info!(worker = %self.name, "stopping worker");
        let _ = self.shutdown.send(true);
        let result = tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .context("Worker did not stop")?
            .context("Worker task panicked")?;
        self.forwarder.stop();
        result.context("Worker loop failed")
    }
}

impl TestFramework {
    pub async fn new(config: TestConfig) -> Result<Self> {
        let test_id = Uuid::new_v4();
        let root = config.data_dir.join(format!("e2e_{test_id}"));
        let queue = SpoolQueue::open(&root, QUEUE_NAME).await?;
        let dead_letter = SpoolQueue::open(&root, DEAD_LETTER_QUEUE).await?;

        Ok(Self {
            config,
            test_id,
            queue: Arc::new(queue),
            dead_letter: Arc::new(dead_letter),
        })
    }

    /// Run a complete test scenario
    pub async fn run_scenario<S: TestScenario + Sync>(&self, scenario: S) -> TestResult {
        info!("Starting test scenario: {}", scenario.name());
        info!("Description: {}", scenario.description());
        info!("Test ID: {}", self.test_id);

        let timeout = scenario.timeout().min(Duration::from_secs(self.config.timeout_secs));
        let start_time = Instant::now();
        let mut test_result = match tokio::time::timeout(timeout, scenario.execute(self)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Test execution failed: {e:#}");
                TestResult::failed(scenario.name(), format!("Execution failed: {e:#}"))
            }
            Err(_) => {
                error!("Test execution timed out");
                TestResult::failed(scenario.name(), "Test execution timed out".to_string())
            }
        };
        test_result.duration = start_time.elapsed();

        info!(
            "Test scenario completed: {} (success: {})",
            scenario.name(),
            test_result.success
        );
        test_result
    }

    /// Start a worker on the shared queue with default dispatcher settings
    pub async fn start_worker(&self, name: &str) -> Result<WorkerHandle> {
        let forwarder = ForwarderBridge::start(ForwarderConfig::new(Endpoint::tcp("127.0.0.1:0")))
            .await
            .context("Failed to start forwarder")?;
        let wake = WakeSignal::bind(&Endpoint::tcp("127.0.0.1:0"))
            .await
            .context("Failed to bind wake signal")?;
        let signal_endpoint = wake
            .endpoint()
            .cloned()
            .context("Wake signal has no endpoint")?;

        let mut dispatcher = WorkerDispatcher::new(
            self.queue.clone(),
            forwarder.connector().clone(),
            DispatcherConfig::default(),
        )
        .with_dead_letter(self.dead_letter.clone())
        .with_wake_signal(wake);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });

        info!(
            worker = name,
            publish = %forwarder.backend_endpoint(),
            signal = %signal_endpoint,
            "worker started"
        );
        Ok(WorkerHandle {
            name: name.to_string(),
            forwarder,
            signal_endpoint,
            shutdown,
            task,
        })
    }

    /// Consumer on `topics` across `workers`, returned once every worker's
    /// forwarder has registered the subscriptions
    pub async fn subscribe(&self, workers: &[&WorkerHandle], topics: &[String]) -> Result<UpdateConsumer> {
        let endpoints: Vec<Endpoint> = workers.iter().map(|w| w.publish_endpoint().clone()).collect();
        let consumer = UpdateConsumer::connect(&endpoints, topics)
            .await?
            .with_receive_timeout(self.receive_timeout());

        tokio::time::timeout(Duration::from_secs(5), async {
            while workers.iter().any(|w| w.stats().subscriptions < topics.len()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .context("Subscriptions never reached the forwarders")?;
        Ok(consumer)
    }

    /// Enqueue `body` and wake `workers`; returns the message id
    pub async fn submit(&self, body: &[u8], workers: &[&WorkerHandle]) -> Result<String> {
        let id = self.queue.enqueue(body).await?;
        debug!(id = %id, "job submitted");
        for worker in workers {
            let signal = async {
                SignalSender::connect(worker.signal_endpoint())
                    .await?
                    .send(id.clone())
                    .await
            };
            if let Err(e) = signal.await {
                warn!(worker = %worker.name, error = %e, "wake signal failed");
            }
        }
        Ok(id)
    }

    /// Wait until the shared queue holds no messages
    pub async fn wait_for_drain(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, async {
            loop {
                if self.queue.len().await? == 0 {
                    return Ok::<_, anyhow::Error>(());
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .context("Queue did not drain")?
    }

    pub fn queue(&self) -> &SpoolQueue {
        &self.queue
    }

    pub fn dead_letter(&self) -> &SpoolQueue {
        &self.dead_letter
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.config.receive_timeout_ms)
    }

    /// Get test configuration
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Get test ID
    pub fn test_id(&self) -> Uuid {
        self.test_id
    }
}

impl Drop for TestFramework {
    fn drop(&mut self) {
        if self.config.cleanup {
            let _ = std::fs::remove_dir_all(self.config.data_dir.join(format!("e2e_{}", self.test_id)));
        }
    }
}
