//! Batch runner: many independent simulations at once.
//!
//! Runs share the controller (which holds no per-run state) and nothing
//! else; each owns its persona, UI state, summary and scores.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::{BatchConfig, RunArtifact};
use crate::services::simulation_controller::SimulationController;

/// Result of one seed in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Position of the seed in the input
    pub index: usize,
    pub run_id: Uuid,
    pub seed: String,
    pub result: SimulationResult<RunArtifact>,
}

pub struct BatchRunner {
    controller: Arc<SimulationController>,
    max_concurrent: usize,
}

impl BatchRunner {
    pub fn new(controller: Arc<SimulationController>, max_concurrent: usize) -> Self {
        Self {
            controller,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn from_config(controller: Arc<SimulationController>, config: &BatchConfig) -> Self {
        Self::new(controller, config.max_concurrent_runs)
    }

    /// Run every seed; outcomes come back in input order.
    pub async fn run_all(
        &self,
        seeds: Vec<String>,
        cancel: &CancellationToken,
    ) -> Vec<BatchOutcome> {
        self.run_all_with_progress(seeds, cancel, |_| {}).await
    }

    /// Like [`run_all`](Self::run_all), calling `on_finished` as each run
    /// completes (in completion order).
    pub async fn run_all_with_progress<F>(
        &self,
        seeds: Vec<String>,
        cancel: &CancellationToken,
        mut on_finished: F,
    ) -> Vec<BatchOutcome>
    where
        F: FnMut(&BatchOutcome),
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let run_ids: Vec<Uuid> = seeds.iter().map(|_| Uuid::new_v4()).collect();

        info!(runs = seeds.len(), max_concurrent = self.max_concurrent, "batch started");

        for (index, seed) in seeds.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let controller = Arc::clone(&self.controller);
            let cancel = cancel.clone();
            let seed = seed.clone();
            let run_id = run_ids[index];

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => controller.run_with_id(run_id, &seed, &cancel).await,
                    Err(_) => Err(SimulationError::RunAborted("batch semaphore closed".into())),
                };
                BatchOutcome {
                    index,
                    run_id,
                    seed,
                    result,
                }
            });
        }

        let mut slots: Vec<Option<BatchOutcome>> = seeds.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    on_finished(&outcome);
                    let index = outcome.index;
                    slots[index] = Some(outcome);
                }
                Err(e) => warn!(error = %e, "batch run task failed"),
            }
        }

        let outcomes: Vec<BatchOutcome> = slots
            .into_iter()
            .zip(seeds)
            .enumerate()
            .map(|(index, (slot, seed))| {
                slot.unwrap_or_else(|| BatchOutcome {
                    index,
                    run_id: run_ids[index],
                    seed,
                    result: Err(SimulationError::RunAborted(
                        "run task did not complete".into(),
                    )),
                })
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(runs = outcomes.len(), failed, "batch finished");
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::{ScriptedAgent, ScriptedOracle};
    use crate::domain::models::{Config, StopReason};

    fn runner(max_concurrent: usize) -> BatchRunner {
        let mut config = Config::default();
        config.simulation.max_steps = 2;
        let controller = SimulationController::builder()
            .oracle(Arc::new(ScriptedOracle::new()))
            .agent(Arc::new(ScriptedAgent::suv_dealer()))
            .config(config)
            .build()
            .unwrap();
        BatchRunner::new(Arc::new(controller), max_concurrent)
    }

    #[tokio::test]
    async fn test_results_in_input_order() {
        let seeds: Vec<String> = (0..5).map(|i| format!("shopper {i}")).collect();
        let mut finished = 0;
        let outcomes = runner(2)
            .run_all_with_progress(seeds.clone(), &CancellationToken::new(), |_| finished += 1)
            .await;

        assert_eq!(finished, 5);
        assert_eq!(outcomes.len(), 5);
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.index, i);
            assert_eq!(outcome.seed, seeds[i]);
            let artifact = outcome.result.as_ref().unwrap();
            assert_eq!(artifact.run_id, outcome.run_id);
            assert_eq!(artifact.seed, seeds[i]);
            assert_eq!(artifact.stop_reason, StopReason::MaxStepsReached);
        }
    }

    #[tokio::test]
    async fn test_invalid_seed_fails_alone() {
        let outcomes = runner(4)
            .run_all(vec!["ok".into(), "  ".into()], &CancellationToken::new())
            .await;
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(SimulationError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_batch_still_returns_artifacts() {
        let token = CancellationToken::new();
        token.cancel();
        let outcomes = runner(2).run_all(vec!["a".into(), "b".into()], &token).await;
        for outcome in outcomes {
            let artifact = outcome.result.unwrap();
            assert_eq!(artifact.stop_reason, StopReason::Cancelled);
            assert!(artifact.turns.is_empty());
        }
    }
}
