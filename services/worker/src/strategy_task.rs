//! One strategy run, published step by step.

use std::time::Duration;

use codec::{envelope, Update};
use network::{Publisher, TransportError};
use tracing::{debug, warn};
use types::{ErrorInfo, Problem, ResultRecord, StrategyKind};

/// How a strategy task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Completed(ResultRecord),
    Failed(ErrorInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyReport {
    pub topic: String,
    pub kind: StrategyKind,
    /// Updates published, terminal update included
    pub published: u64,
    pub outcome: StrategyOutcome,
}

/// Solve `problem` with `kind`, publishing every step on the strategy's topic.
///
/// The first step goes out as Initial, later ones as Action, then exactly
/// one Completion or Error. `work_delay_ms` paces the steps: positive values
/// sleep, zero yields to the scheduler, negative values run straight through.
pub async fn run_strategy(
    problem: Problem,
    kind: StrategyKind,
    mut publisher: Publisher,
    work_delay_ms: i32,
) -> Result<StrategyReport, TransportError> {
    let mut steps = problem.solve(kind);
    let topic = steps.topic();
    let mut published = 0u64;

    for step in steps.by_ref() {
        let update = match step {
            Ok(step) if published == 0 => Update::Initial(step),
            Ok(step) => Update::Action(step),
            Err(e) => {
                let info = ErrorInfo::from(&e);
                warn!(topic = %topic, error = %e, "strategy failed");
                publisher
                    .send(envelope::encode(&topic, &Update::Error(info.clone())))
                    .await?;
                return Ok(StrategyReport {
                    topic,
                    kind,
                    published: published + 1,
                    outcome: StrategyOutcome::Failed(info),
                });
            }
        };
        publisher.send(envelope::encode(&topic, &update)).await?;
        published += 1;
        pace(work_delay_ms).await;
    }

    let result = steps.result();
    publisher
        .send(envelope::encode(&topic, &Update::Completion(result)))
        .await?;
    debug!(topic = %topic, steps = result.step_count, "strategy completed");

    Ok(StrategyReport {
        topic,
        kind,
        published: published + 1,
        outcome: StrategyOutcome::Completed(result),
    })
}

async fn pace(work_delay_ms: i32) {
    match work_delay_ms {
        ms if ms > 0 => tokio::time::sleep(Duration::from_millis(ms as u64)).await,
        0 => tokio::task::yield_now().await,
        _ => {}
    }
}
