//! Runs every scenario through the framework, one fresh queue each

use e2e_tests::{
    GoldenPathTest, PoisonMessageTest, SharedQueueTest, TestConfig, TestFramework, TestResult,
    TestScenario, TopicIsolationTest, UnsolvableJobTest,
};

async fn run<S: TestScenario + Sync>(scenario: S) -> TestResult {
    let dir = std::env::temp_dir().join("buckets_e2e_tests");
    let framework = TestFramework::new(TestConfig {
        data_dir: dir,
        ..TestConfig::default()
    })
    .await
    .unwrap();
    let result = framework.run_scenario(scenario).await;
    assert!(
        result.success,
        "{} failed: {:?} {:#?}",
        result.scenario_name,
        result.error_message,
        result
            .validation_results
            .iter()
            .filter(|v| !v.passed)
            .collect::<Vec<_>>()
    );
    result
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_golden_path_over_tcp() {
    let result = run(GoldenPathTest).await;
    // Init plus 8 actions and a completion, Init plus 6 and a completion
    assert_eq!(result.metrics.updates_received, 10 + 8);
    assert_eq!(result.metrics.updates_relayed, 18);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_topic_isolation() {
    run(TopicIsolationTest).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsolvable_job_reports_errors() {
    let result = run(UnsolvableJobTest).await;
    assert_eq!(result.metrics.updates_relayed, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_poison_message_is_dead_lettered() {
    run(PoisonMessageTest { prior_claims: 5 }).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shared_queue_with_competing_workers() {
    let result = run(SharedQueueTest {
        workers: 2,
        jobs: vec![(3, 5, 4), (2, 7, 5), (4, 9, 6)],
    })
    .await;
    assert_eq!(result.metrics.jobs_submitted, 3);
}
