//! Simulation controller: drives one persona through a full conversation.
//!
//! ```text
//! Init -> Running{step} -> Finished(reason)
//! ```
//!
//! Every step runs draft -> UI actions -> agent call -> summary fusion ->
//! emotion critique against local copies of the run state and commits them
//! together at the end, so an agent failure or cancellation mid-step leaves
//! no partial turn behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use crate::adapters::events::NullEventSink;
use crate::adapters::store::InMemorySessionStore;
use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::{
    Action, Config, ControllerState, PersonaProfile, RunArtifact, SimulationSession, StopReason,
    StopResult, Thresholds, TurnRecord, UiState, ARTIFACT_SCHEMA_VERSION,
};
use crate::domain::ports::{
    event_types, AgentError, AgentRequest, AgentResponse, AgentUnderTest, EventSink, Oracle,
    SessionStore,
};
use crate::infrastructure::config::ConfigLoader;
use crate::services::alignment_judge::AlignmentJudge;
use crate::services::conversation_memory::ConversationMemory;
use crate::services::emotion_scorer::EmotionScorer;
use crate::services::oracle_gateway::{cancellable, OracleGateway};
use crate::services::persona_builder::PersonaBuilder;
use crate::services::turn_drafter::{DraftContext, TurnDrafter};
use crate::services::ui_executor::UiExecutor;

/// Builder for [`SimulationController`].
#[derive(Default)]
pub struct SimulationControllerBuilder {
    oracle: Option<Arc<dyn Oracle>>,
    agent: Option<Arc<dyn AgentUnderTest>>,
    store: Option<Arc<dyn SessionStore>>,
    events: Option<Arc<dyn EventSink>>,
    config: Option<Config>,
}

impl SimulationControllerBuilder {
    #[must_use]
    pub fn oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    #[must_use]
    pub fn agent(mut self, agent: Arc<dyn AgentUnderTest>) -> Self {
        self.agent = Some(agent);
        self
    }

    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Assemble the controller. The oracle and the agent are required.
    pub fn build(self) -> SimulationResult<SimulationController> {
        let oracle = self
            .oracle
            .ok_or_else(|| SimulationError::ValidationFailed("an oracle is required".into()))?;
        let agent = self.agent.ok_or_else(|| {
            SimulationError::ValidationFailed("an agent under test is required".into())
        })?;
        let config = self.config.unwrap_or_default();
        ConfigLoader::validate(&config)
            .map_err(|e| SimulationError::ValidationFailed(e.to_string()))?;

        let gateway = OracleGateway::from_config(oracle, &config.oracle);
        let judge = AlignmentJudge::from_config(gateway.clone(), &config.judge);
        let drafter = TurnDrafter::new(
            gateway.clone(),
            judge,
            config.judge.max_redrafts,
            config.simulation.max_actions_per_turn,
        );

        Ok(SimulationController {
            persona_builder: PersonaBuilder::from_config(gateway.clone(), &config.persona),
            drafter,
            executor: UiExecutor::new(config.simulation.page_size),
            gateway,
            agent,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemorySessionStore::new())),
            events: self.events.unwrap_or_else(|| Arc::new(NullEventSink)),
            config,
        })
    }
}

/// Runs simulations. Holds no per-run state, so one controller can drive
/// many runs concurrently.
pub struct SimulationController {
    gateway: OracleGateway,
    persona_builder: PersonaBuilder,
    drafter: TurnDrafter,
    executor: UiExecutor,
    agent: Arc<dyn AgentUnderTest>,
    store: Arc<dyn SessionStore>,
    events: Arc<dyn EventSink>,
    config: Config,
}

/// State exclusively owned by one run.
struct RunContext {
    run_id: Uuid,
    seed: String,
    profile: PersonaProfile,
    state: ControllerState,
    ui: UiState,
    memory: ConversationMemory,
    scorer: EmotionScorer,
    last_reply: Option<String>,
    turns: Vec<TurnRecord>,
}

enum StepOutcome {
    Continue,
    Stop(StopReason),
}

impl SimulationController {
    pub fn builder() -> SimulationControllerBuilder {
        SimulationControllerBuilder::default()
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.store)
    }

    /// Run one simulation with a fresh run id.
    pub async fn run(
        &self,
        seed: &str,
        cancel: &CancellationToken,
    ) -> SimulationResult<RunArtifact> {
        self.run_with_id(Uuid::new_v4(), seed, cancel).await
    }

    /// Run one simulation to completion.
    ///
    /// Agent failures and cancellation end the run early but still return
    /// an artifact. Only an invalid seed is an error.
    #[instrument(skip(self, seed, cancel), fields(step = tracing::field::Empty))]
    pub async fn run_with_id(
        &self,
        run_id: Uuid,
        seed: &str,
        cancel: &CancellationToken,
    ) -> SimulationResult<RunArtifact> {
        let seed = seed.trim();
        if seed.is_empty() {
            return Err(SimulationError::ValidationFailed(
                "persona seed must not be empty".to_string(),
            ));
        }
        let started_at = Utc::now();
        let max_steps = self.config.simulation.max_steps;

        let session = SimulationSession::new(run_id, seed);
        if let Err(e) = self.store.create(&session).await {
            warn!(error = %e, "failed to record session start");
        }
        self.events.log(
            event_types::RUN_STARTED,
            json!({ "run_id": run_id, "seed": seed, "max_steps": max_steps }),
        );
        info!(max_steps, "simulation started");

        let profile = match self.persona_builder.build(seed, cancel).await {
            Ok(profile) => profile,
            Err(SimulationError::Cancelled) => {
                let profile = PersonaProfile::neutral(seed);
                let thresholds = Thresholds::derive(&profile, &self.config.emotion);
                let ctx = self.new_context(run_id, seed, profile, thresholds);
                return Ok(self
                    .finish(ctx, session, StopReason::Cancelled, None, started_at)
                    .await);
            }
            Err(e) => return Err(e),
        };

        let thresholds = Thresholds::derive(&profile, &self.config.emotion);
        self.events.log(
            event_types::PERSONA_BUILT,
            json!({
                "run_id": run_id,
                "persona": profile,
                "thresholds": thresholds,
            }),
        );
        debug!(
            positive_threshold = thresholds.positive_threshold,
            negative_threshold = thresholds.negative_threshold,
            degraded = profile.is_degraded(),
            "persona ready"
        );

        let mut ctx = self.new_context(run_id, seed, profile, thresholds);
        let mut reason = StopReason::MaxStepsReached;
        let mut detail = None;

        for step in 1..=max_steps {
            ctx.state = ControllerState::Running { step };
            Span::current().record("step", step);

            match self.run_step(&mut ctx, step, cancel).await {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Stop(stop)) => {
                    reason = stop;
                    break;
                }
                Err(SimulationError::Cancelled) => {
                    info!(step, "simulation cancelled");
                    reason = StopReason::Cancelled;
                    break;
                }
                Err(SimulationError::AgentUnavailable(msg)) => {
                    warn!(step, error = %msg, "agent under test unavailable, ending run");
                    reason = StopReason::AgentUnavailable;
                    detail = Some(msg);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(self.finish(ctx, session, reason, detail, started_at).await)
    }

    fn new_context(
        &self,
        run_id: Uuid,
        seed: &str,
        profile: PersonaProfile,
        thresholds: Thresholds,
    ) -> RunContext {
        RunContext {
            run_id,
            seed: seed.to_string(),
            memory: ConversationMemory::new(self.gateway.clone(), &self.config.memory, seed),
            scorer: EmotionScorer::new(self.gateway.clone(), thresholds, &self.config.emotion),
            profile,
            state: ControllerState::Init,
            ui: UiState::new(),
            last_reply: None,
            turns: Vec::new(),
        }
    }

    /// One all-or-nothing step. Nothing in `ctx` changes unless it returns `Ok`.
    async fn run_step(
        &self,
        ctx: &mut RunContext,
        step: u32,
        cancel: &CancellationToken,
    ) -> SimulationResult<StepOutcome> {
        let turn = self
            .drafter
            .draft_turn(
                DraftContext {
                    profile: &ctx.profile,
                    summary: ctx.memory.summary(),
                    ui: &ctx.ui,
                    last_reply: ctx.last_reply.as_deref(),
                },
                cancel,
            )
            .await?;

        let mut ui = self.executor.apply_all(&ctx.ui, &turn.actions);

        let request = AgentRequest {
            message: turn.user_text.clone(),
            ui_context: ui.context_json(),
            meta: json!({ "run_id": ctx.run_id, "step": step, "simulated": true }),
        };
        let response = self.call_agent(request, cancel).await?;
        ui.sync_cards(response.cards(), self.config.simulation.page_size);

        let fusion = ctx
            .memory
            .fuse(&turn.user_text, &response.response_text, &turn.actions, cancel)
            .await?;
        let (assessment, critic_degradation) = ctx
            .scorer
            .assess(&response.response_text, &ctx.profile, &fusion.summary, cancel)
            .await?;

        // Commit.
        ctx.memory.commit(fusion.summary);
        let stop = ctx.scorer.apply(step, assessment.delta);
        let user_ended = turn.actions.iter().any(Action::is_stop);

        let mut degradations = turn.degradations;
        degradations.extend(fusion.degradation);
        degradations.extend(critic_degradation);

        let record = TurnRecord {
            step,
            user_text: turn.user_text,
            assistant_text: response.response_text.clone(),
            actions: turn.actions,
            ui_state: ui.clone(),
            summary_excerpt: ctx.memory.excerpt(),
            emotion: ctx.scorer.scores(),
            emotion_rationale: assessment.rationale,
            verdict: turn.verdict,
            redrafts: turn.redrafts,
            stop,
            degradations,
        };
        self.events.log(
            event_types::TURN_COMPLETED,
            json!({
                "run_id": ctx.run_id,
                "step": step,
                "judge_score": record.verdict.score,
                "passes": record.verdict.passes,
                "redrafts": record.redrafts,
                "dropped_actions": turn.dropped_actions,
                "emotion": record.emotion,
                "stop": record.stop,
            }),
        );
        debug!(
            step,
            redrafts = record.redrafts,
            positive = record.emotion.positive,
            negative = record.emotion.negative,
            "turn completed"
        );

        ctx.ui = ui;
        ctx.last_reply = Some(response.response_text);
        ctx.turns.push(record);

        Ok(match stop {
            Some(StopResult {
                triggering_channel, ..
            }) => StepOutcome::Stop(triggering_channel.into()),
            None if user_ended => StepOutcome::Stop(StopReason::UserEnded),
            None => StepOutcome::Continue,
        })
    }

    /// Call the agent with per-attempt timeouts. Timeouts and transport
    /// failures are retried; anything else ends the run.
    async fn call_agent(
        &self,
        request: AgentRequest,
        cancel: &CancellationToken,
    ) -> SimulationResult<AgentResponse> {
        let timeout = Duration::from_secs(self.config.agent.timeout_secs);
        let max_attempts = self.config.agent.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            let call = tokio::time::timeout(timeout, self.agent.respond(request.clone()));
            let error = match cancellable(cancel, call).await? {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => e,
                Err(_) => AgentError::Timeout,
            };
            if error.is_retryable() && attempt < max_attempts {
                warn!(attempt, max_attempts, error = %error, "agent call failed, retrying");
                attempt += 1;
                continue;
            }
            return Err(SimulationError::AgentUnavailable(error.to_string()));
        }
    }

    async fn finish(
        &self,
        mut ctx: RunContext,
        mut session: SimulationSession,
        reason: StopReason,
        detail: Option<String>,
        started_at: chrono::DateTime<Utc>,
    ) -> RunArtifact {
        ctx.state = ControllerState::Finished(reason);
        let steps_used = u32::try_from(ctx.turns.len()).unwrap_or(u32::MAX);
        let artifact = RunArtifact {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            run_id: ctx.run_id,
            seed: ctx.seed,
            persona_profile: ctx.profile,
            thresholds: ctx.scorer.thresholds(),
            gamma: self.config.emotion.gamma,
            stop_result: ctx.scorer.stop_result(),
            turns: ctx.turns,
            stop_reason: reason,
            stop_detail: detail,
            steps_used,
            started_at,
            finished_at: Utc::now(),
        };

        session.finish(artifact.clone());
        if let Err(e) = self.store.update(&session).await {
            warn!(error = %e, "failed to store run artifact");
        }
        self.events.log(
            event_types::RUN_FINISHED,
            json!({
                "run_id": artifact.run_id,
                "stop_reason": reason,
                "steps_used": steps_used,
                "stop_detail": artifact.stop_detail,
            }),
        );
        info!(stop_reason = %reason, steps_used, state = ?ctx.state, "simulation finished");
        artifact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::{three_suvs, AgentReply, ScriptedAgent, ScriptedOracle};
    use crate::domain::models::SessionStatus;

    fn controller(agent: ScriptedAgent, config: Config) -> SimulationController {
        SimulationController::builder()
            .oracle(Arc::new(ScriptedOracle::new()))
            .agent(Arc::new(agent))
            .config(config)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let result = SimulationController::builder().build();
        assert!(matches!(result, Err(SimulationError::ValidationFailed(_))));
    }

    #[test]
    fn test_builder_rejects_step_cap_overflow() {
        let mut config = Config::default();
        config.simulation.max_steps = 31;
        let result = SimulationController::builder()
            .oracle(Arc::new(ScriptedOracle::new()))
            .agent(Arc::new(ScriptedAgent::suv_dealer()))
            .config(config)
            .build();
        assert!(matches!(result, Err(SimulationError::ValidationFailed(_))));
    }

    fn build_with(config: Config) -> SimulationResult<SimulationController> {
        SimulationController::builder()
            .oracle(Arc::new(ScriptedOracle::new()))
            .agent(Arc::new(ScriptedAgent::suv_dealer()))
            .config(config)
            .build()
    }

    #[test]
    fn test_builder_rejects_gamma_out_of_range() {
        for gamma in [1.5, 0.2, f64::NAN] {
            let mut config = Config::default();
            config.emotion.gamma = gamma;
            assert!(
                matches!(build_with(config), Err(SimulationError::ValidationFailed(_))),
                "gamma {gamma} accepted"
            );
        }
    }

    #[test]
    fn test_builder_rejects_non_positive_cap() {
        for cap in [0.0, -1.0] {
            let mut config = Config::default();
            config.emotion.cap = cap;
            assert!(matches!(
                build_with(config),
                Err(SimulationError::ValidationFailed(_))
            ));
        }
    }

    #[test]
    fn test_builder_rejects_invalid_pass_threshold() {
        let mut config = Config::default();
        config.judge.pass_threshold = 1.5;
        assert!(matches!(
            build_with(config),
            Err(SimulationError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_calm_run_reaches_max_steps_and_is_stored() {
        let mut config = Config::default();
        config.simulation.max_steps = 3;
        let controller = controller(ScriptedAgent::suv_dealer(), config);

        let artifact = controller.run("seed", &CancellationToken::new()).await.unwrap();
        assert_eq!(artifact.stop_reason, StopReason::MaxStepsReached);
        assert_eq!(artifact.steps_used, 3);
        assert_eq!(artifact.turns.len(), 3);
        assert_eq!(
            artifact.turns.iter().map(|t| t.step).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(artifact.turns[0].ui_state.cards.len(), 3);

        let stored = controller
            .session_store()
            .get(artifact.run_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(stored.artifact.unwrap().steps_used, 3);
    }

    #[tokio::test]
    async fn test_agent_timeout_is_retried() {
        let mut config = Config::default();
        config.simulation.max_steps = 1;
        config.agent.max_attempts = 2;
        let agent = ScriptedAgent::suv_dealer().then(AgentReply::Fail(AgentError::Timeout));
        let agent = Arc::new(agent);
        let controller = SimulationController::builder()
            .oracle(Arc::new(ScriptedOracle::new()))
            .agent(agent.clone())
            .config(config)
            .build()
            .unwrap();

        let artifact = controller.run("seed", &CancellationToken::new()).await.unwrap();
        assert_eq!(artifact.stop_reason, StopReason::MaxStepsReached);
        assert_eq!(agent.call_count(), 2);
    }

    #[tokio::test]
    async fn test_agent_http_error_ends_run() {
        let agent = ScriptedAgent::always(three_suvs()).then(AgentReply::Fail(AgentError::Status {
            status: 500,
            body: "boom".into(),
        }));
        let artifact = controller(agent, Config::default())
            .run("seed", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(artifact.stop_reason, StopReason::AgentUnavailable);
        assert!(artifact.turns.is_empty());
        assert!(artifact.stop_detail.unwrap().contains("500"));
    }
}
