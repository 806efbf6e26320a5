//! End-to-end scenarios, each run against freshly started workers

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use codec::Update;
use types::{ActionKind, JobDescriptor, Problem, StepRecord, StrategyKind};
use update_consumer::UpdateConsumer;
use worker::WorkQueue;

use crate::framework::{TestFramework, TestMetrics, TestResult, TestScenario, ValidationResult};

/// Everything one topic published, in arrival order
#[derive(Debug, Default)]
pub struct TopicLog {
    pub steps: Vec<StepRecord>,
    pub terminal: Option<Update>,
    pub after_terminal: usize,
}

/// Drain `consumer` until every subscribed topic has terminated
pub async fn collect_topics(
    consumer: &mut UpdateConsumer,
    timeout: Duration,
) -> Result<HashMap<String, TopicLog>> {
    let mut logs: HashMap<String, TopicLog> = HashMap::new();
    while let Some(envelope) = consumer.next_update(timeout).await? {
        let log = logs.entry(envelope.topic).or_default();
        if log.terminal.is_some() {
            log.after_terminal += 1;
            continue;
        }
        match envelope.update {
            Update::Initial(step) | Update::Action(step) => log.steps.push(step),
            terminal => log.terminal = Some(terminal),
        }
    }
    Ok(logs)
}

fn topics(problem: &Problem) -> Vec<String> {
    StrategyKind::ALL
        .iter()
        .map(|&kind| problem.solve(kind).topic())
        .collect()
}

fn completion_steps(log: Option<&TopicLog>) -> Option<i32> {
    match log.and_then(|l| l.terminal.as_ref()) {
        Some(Update::Completion(result)) => Some(result.step_count),
        _ => None,
    }
}

/// 3/5/4 over TCP: both strategies stream to completion
pub struct GoldenPathTest;

#[async_trait::async_trait]
impl TestScenario for GoldenPathTest {
    async fn execute(&self, framework: &TestFramework) -> Result<TestResult> {
        let worker = framework.start_worker("worker-1").await?;
        let problem = Problem::new(3, 5, 4)?;
        let topics = topics(&problem);
        let mut consumer = framework.subscribe(&[&worker], &topics).await?;

        framework
            .submit(&codec::job::encode(&JobDescriptor::new(3, 5, 4)), &[&worker])
            .await?;
        let logs = collect_topics(&mut consumer, framework.receive_timeout()).await?;
        framework.wait_for_drain(Duration::from_secs(5)).await?;

        let small = logs.get(&topics[0]);
        let big = logs.get(&topics[1]);
        let mut validations = vec![
            ValidationResult::expect_eq("small_to_big_steps", Some(8), completion_steps(small)),
            ValidationResult::expect_eq("big_to_small_steps", Some(6), completion_steps(big)),
        ];

        for (topic, log) in &logs {
            let numbers: Vec<i32> = log.steps.iter().map(|s| s.step_number).collect();
            let expected: Vec<i32> = (0..numbers.len() as i32).collect();
            validations.push(ValidationResult::expect_eq(
                &format!("step_order[{topic}]"),
                expected,
                numbers,
            ));
            validations.push(ValidationResult::check(
                &format!("starts_with_init[{topic}]"),
                log.steps.first().is_some_and(|s| s.action == ActionKind::Init),
                "first step is Init",
            ));
        }

        let final_fill = big
            .and_then(|log| log.steps.last())
            .and_then(|step| step.ending_state.containers.iter().find(|c| c.capacity() == 5))
            .map(|c| c.fill());
        validations.push(ValidationResult::expect_eq("goal_volume_reached", Some(4), final_fill));

        let stats = worker.stats();
        let received = logs.values().map(|l| l.steps.len() as u64 + 1).sum();
        worker.stop().await?;

        Ok(TestResult::from_validations(
            self.name(),
            TestMetrics {
                jobs_submitted: 1,
                updates_received: received,
                updates_relayed: stats.relayed,
                updates_dropped: stats.dropped,
            },
            validations,
        ))
    }

    fn name(&self) -> &str {
        "golden_path"
    }

    fn description(&self) -> &str {
        "Solve 3/5/4 with both strategies and stream every step over TCP"
    }
}

/// A subscriber sees only the topics it asked for
pub struct TopicIsolationTest;

#[async_trait::async_trait]
impl TestScenario for TopicIsolationTest {
    async fn execute(&self, framework: &TestFramework) -> Result<TestResult> {
        let worker = framework.start_worker("worker-1").await?;
        let watched = Problem::new(2, 7, 5)?.solve(StrategyKind::BigToSmall).topic();
        let mut consumer = framework.subscribe(&[&worker], &[watched.clone()]).await?;

        framework
            .submit(&codec::job::encode(&JobDescriptor::new(3, 5, 4)), &[&worker])
            .await?;
        framework
            .submit(&codec::job::encode(&JobDescriptor::new(2, 7, 5)), &[&worker])
            .await?;
        let logs = collect_topics(&mut consumer, framework.receive_timeout()).await?;
        framework.wait_for_drain(Duration::from_secs(5)).await?;

        let stats = worker.stats();
        worker.stop().await?;

        let validations = vec![
            ValidationResult::expect_eq(
                "only_watched_topic",
                vec![watched.as_str()],
                logs.keys().map(String::as_str).collect(),
            ),
            ValidationResult::expect_eq("nothing_filtered_client_side", 0, consumer.ignored()),
            ValidationResult::check(
                "unwatched_updates_dropped",
                stats.dropped > 0,
                format!("forwarder dropped {}", stats.dropped),
            ),
        ];
        Ok(TestResult::from_validations(
            self.name(),
            TestMetrics {
                jobs_submitted: 2,
                updates_received: logs.values().map(|l| l.steps.len() as u64 + 1).sum(),
                updates_relayed: stats.relayed,
                updates_dropped: stats.dropped,
            },
            validations,
        ))
    }

    fn name(&self) -> &str {
        "topic_isolation"
    }

    fn description(&self) -> &str {
        "Two jobs, one watched topic: the forwarder filters the rest"
    }
}

/// Unsolvable jobs end each topic with a single Error
pub struct UnsolvableJobTest;

#[async_trait::async_trait]
impl TestScenario for UnsolvableJobTest {
    async fn execute(&self, framework: &TestFramework) -> Result<TestResult> {
        let worker = framework.start_worker("worker-1").await?;
        let problem = Problem::new(4, 4, 3)?;
        let topics = topics(&problem);
        let mut consumer = framework.subscribe(&[&worker], &topics).await?;

        framework
            .submit(&codec::job::encode_short(&JobDescriptor::new(4, 4, 3)), &[&worker])
            .await?;

        let logs = collect_topics(&mut consumer, framework.receive_timeout()).await?;
        let mut validations = Vec::new();
        for topic in &topics {
            let log = logs.get(topic);
            let passed = log.is_some_and(|l| {
                l.steps.is_empty()
                    && matches!(&l.terminal, Some(Update::Error(info)) if info.kind_tag == "UnsolvableError")
            });
            validations.push(ValidationResult::check(
                &format!("unsolvable[{topic}]"),
                passed,
                format!("{:?}", log.and_then(|l| l.terminal.as_ref())),
            ));
        }
        framework.wait_for_drain(Duration::from_secs(5)).await?;
        validations.push(ValidationResult::check(
            "all_topics_terminated",
            consumer.is_finished(),
            "consumer finished",
        ));

        let stats = worker.stats();
        worker.stop().await?;
        Ok(TestResult::from_validations(
            self.name(),
            TestMetrics {
                jobs_submitted: 1,
                updates_received: 2,
                updates_relayed: stats.relayed,
                updates_dropped: stats.dropped,
            },
            validations,
        ))
    }

    fn name(&self) -> &str {
        "unsolvable_job"
    }

    fn description(&self) -> &str {
        "4/4/3 cannot be measured: each strategy publishes one Error"
    }
}

/// Messages dequeued too often are dead-lettered without running
pub struct PoisonMessageTest {
    pub prior_claims: u32,
}

#[async_trait::async_trait]
impl TestScenario for PoisonMessageTest {
    async fn execute(&self, framework: &TestFramework) -> Result<TestResult> {
        let body = codec::job::encode(&JobDescriptor::new(3, 5, 4));
        framework.queue().enqueue(&body).await?;
        // Claims that expire immediately, as if earlier workers had crashed
        for _ in 0..self.prior_claims {
            framework.queue().claim(Duration::ZERO).await?;
        }

        let worker = framework.start_worker("worker-1").await?;
        framework.wait_for_drain(Duration::from_secs(5)).await?;

        let stats = worker.stats();
        worker.stop().await?;

        let validations = vec![
            ValidationResult::expect_eq("nothing_published", 0, stats.relayed + stats.dropped),
            ValidationResult::expect_eq("dead_lettered", 1, framework.dead_letter().len().await?),
        ];
        Ok(TestResult::from_validations(
            self.name(),
            TestMetrics {
                jobs_submitted: 1,
                updates_relayed: stats.relayed,
                updates_dropped: stats.dropped,
                ..TestMetrics::default()
            },
            validations,
        ))
    }

    fn name(&self) -> &str {
        "poison_message"
    }

    fn description(&self) -> &str {
        "A job claimed past the poison threshold is discarded unprocessed"
    }
}

/// Several workers share the queue; one consumer merges their streams
pub struct SharedQueueTest {
    pub workers: usize,
    pub jobs: Vec<(i32, i32, i32)>,
}

#[async_trait::async_trait]
impl TestScenario for SharedQueueTest {
    async fn execute(&self, framework: &TestFramework) -> Result<TestResult> {
        let mut workers = Vec::with_capacity(self.workers);
        for i in 0..self.workers {
            workers.push(framework.start_worker(&format!("worker-{}", i + 1)).await?);
        }
        let handles: Vec<_> = workers.iter().collect();

        let mut all_topics = Vec::new();
        for &(first, second, goal) in &self.jobs {
            all_topics.extend(topics(&Problem::new(first, second, goal)?));
        }
        let mut consumer = framework.subscribe(&handles, &all_topics).await?;

        for &(first, second, goal) in &self.jobs {
            framework
                .submit(
                    &codec::job::encode(&JobDescriptor::new(first, second, goal)),
                    &handles,
                )
                .await?;
        }
        let logs = collect_topics(&mut consumer, framework.receive_timeout()).await?;
        framework.wait_for_drain(Duration::from_secs(5)).await?;

        let mut validations = vec![ValidationResult::expect_eq(
            "every_topic_terminated",
            all_topics.len(),
            logs.values().filter(|l| l.terminal.is_some()).count(),
        )];
        validations.push(ValidationResult::expect_eq(
            "no_updates_after_terminal",
            0,
            logs.values().map(|l| l.after_terminal).sum::<usize>(),
        ));

        let mut metrics = TestMetrics {
            jobs_submitted: self.jobs.len() as u64,
            updates_received: logs.values().map(|l| l.steps.len() as u64 + 1).sum(),
            ..TestMetrics::default()
        };
        for worker in workers {
            let stats = worker.stats();
            metrics.updates_relayed += stats.relayed;
            metrics.updates_dropped += stats.dropped;
            worker.stop().await?;
        }
        Ok(TestResult::from_validations(self.name(), metrics, validations))
    }

    fn name(&self) -> &str {
        "shared_queue"
    }

    fn description(&self) -> &str {
        "Competing workers drain one queue while a consumer follows all of them"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }
}
