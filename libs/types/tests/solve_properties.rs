//! Property tests for strategy runs over small problems

use proptest::prelude::*;
use types::{ActionKind, DomainError, Problem, StrategyKind};

fn kinds() -> impl Strategy<Value = StrategyKind> {
    prop_oneof![Just(StrategyKind::SmallToBig), Just(StrategyKind::BigToSmall)]
}

proptest! {
    #[test]
    fn runs_terminate_with_goal_or_unsolvable(
        first in 1i32..=24,
        second in 1i32..=24,
        goal in 0i32..=30,
        kind in kinds(),
    ) {
        let problem = Problem::new(first, second, goal).unwrap();
        let mut run = problem.solve_unchecked(kind);
        let mut last_step = None;
        let mut failure = None;

        for item in run.by_ref().take(10_000) {
            match item {
                Ok(step) => last_step = Some(step),
                Err(err) => failure = Some(err),
            }
        }
        prop_assert!(run.next().is_none(), "run did not terminate");

        match failure {
            Some(DomainError::Unsolvable { .. }) => {}
            Some(other) => prop_assert!(false, "unexpected error {other}"),
            None => {
                let step = last_step.expect("init step always yielded");
                prop_assert!(step.ending_state.containers.iter().any(|c| c.fill() == goal));
                prop_assert_eq!(run.result().step_count, step.step_number);
            }
        }
    }

    #[test]
    fn steps_respect_fill_and_reservoir_invariants(
        first in 1i32..=16,
        second in 1i32..=16,
        goal in 1i32..=16,
        kind in kinds(),
    ) {
        let problem = Problem::new(first, second, goal).unwrap();
        let mut drawn = 0;
        let mut discharged = 0;
        let mut expected_number = 0;

        for step in problem.solve(kind).take(10_000).flatten() {
            prop_assert_eq!(step.step_number, expected_number);
            expected_number += 1;

            for container in &step.ending_state.containers {
                prop_assert!(container.fill() >= 0 && container.fill() <= container.capacity());
            }
            let reservoir = step.ending_state.reservoir;
            prop_assert!(reservoir.volume_drawn >= drawn);
            prop_assert!(reservoir.volume_discharged >= discharged);
            drawn = reservoir.volume_drawn;
            discharged = reservoir.volume_discharged;

            if step.action == ActionKind::Init {
                prop_assert_eq!(step.amount, 0);
            } else {
                prop_assert!(step.amount > 0);
            }
        }
    }
}

#[test]
fn solvable_problems_reach_goal_with_both_strategies() {
    for (first, second, goal) in [(3, 5, 4), (5, 3, 4), (2, 7, 5), (4, 9, 6)] {
        let problem = Problem::new(first, second, goal).unwrap();
        assert!(problem.is_solvable(), "{}", problem.key());
        for kind in StrategyKind::ALL {
            let steps: Vec<_> = problem
                .solve(kind)
                .collect::<Result<_, _>>()
                .unwrap_or_else(|e| panic!("{} {kind}: {e}", problem.key()));
            let last = steps.last().unwrap();
            assert!(last.ending_state.containers.iter().any(|c| c.fill() == goal));
        }
    }
}
