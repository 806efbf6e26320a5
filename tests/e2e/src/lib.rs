//! End-to-End Test Framework for the bucket puzzle workers
//!
//! Drives the whole path in one process: jobs go into a spool queue, workers
//! claim them and publish through their forwarders over TCP, and an
//! [`UpdateConsumer`](update_consumer::UpdateConsumer) checks what arrives.

pub mod framework;
pub mod scenarios;

pub use framework::{
    TestConfig, TestFramework, TestMetrics, TestResult, TestScenario, ValidationResult, WorkerHandle,
};
pub use scenarios::*;
