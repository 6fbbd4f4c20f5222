//! Turn drafter with the judge-gated redraft loop.
//!
//! The loop is an explicit state machine so it always terminates:
//!
//! ```text
//! Drafting(n) -> Judging(n) -> Accepted
//!                           -> Drafting(n + 1)   while n < max_redrafts
//!                           -> Accepted          (failing verdict kept)
//! ```
//!
//! A failed verdict's reminder is injected into every later draft of the
//! same turn.

use serde::{Deserialize, Deserializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::{
    AcceptedTurn, Action, ConversationSummary, Degradation, JudgeVerdict, PersonaProfile, UiState,
};
use crate::services::alignment_judge::{AlignmentJudge, JudgeInput};
use crate::services::oracle_gateway::OracleGateway;
use crate::services::prompts;

const FALLBACK_UTTERANCE: &str = "Hmm, can you show me a few more options?";

#[derive(Debug, Deserialize)]
struct RawDraft {
    #[serde(alias = "user_text", alias = "message", deserialize_with = "non_empty")]
    utterance: String,
    #[serde(default)]
    actions: Vec<serde_json::Value>,
}

fn non_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let text = text.trim();
    if text.is_empty() {
        Err(serde::de::Error::custom("utterance must not be empty"))
    } else {
        Ok(text.to_string())
    }
}

/// Decode raw action values, dropping unknown or malformed entries and
/// truncating to `max`. Returns the kept actions and the number dropped.
pub fn parse_actions(raw: &[serde_json::Value], max: usize) -> (Vec<Action>, usize) {
    let mut actions: Vec<Action> = raw.iter().filter_map(Action::from_value).collect();
    actions.truncate(max);
    let dropped = raw.len() - actions.len();
    (actions, dropped)
}

/// Everything the drafter conditions on for one step.
#[derive(Debug, Clone, Copy)]
pub struct DraftContext<'a> {
    pub profile: &'a PersonaProfile,
    pub summary: &'a ConversationSummary,
    pub ui: &'a UiState,
    /// `None` before the agent has said anything.
    pub last_reply: Option<&'a str>,
}

#[derive(Debug, Clone)]
struct Draft {
    utterance: String,
    actions: Vec<Action>,
    dropped: usize,
}

enum DraftPhase {
    Drafting { redraft: u32 },
    Judging { redraft: u32, draft: Draft },
    Accepted { redraft: u32, draft: Draft, verdict: JudgeVerdict },
}

pub struct TurnDrafter {
    gateway: OracleGateway,
    judge: AlignmentJudge,
    max_redrafts: u32,
    max_actions: usize,
}

impl TurnDrafter {
    pub const fn new(
        gateway: OracleGateway,
        judge: AlignmentJudge,
        max_redrafts: u32,
        max_actions: usize,
    ) -> Self {
        Self {
            gateway,
            judge,
            max_redrafts,
            max_actions,
        }
    }

    /// Produce one accepted turn. Only cancellation is an error.
    #[instrument(skip_all, fields(max_redrafts = self.max_redrafts))]
    pub async fn draft_turn(
        &self,
        ctx: DraftContext<'_>,
        cancel: &CancellationToken,
    ) -> SimulationResult<AcceptedTurn> {
        let mut reminders: Vec<String> = Vec::new();
        let mut degradations = Vec::new();
        let mut last_judged: Option<(Draft, JudgeVerdict)> = None;
        let mut phase = DraftPhase::Drafting { redraft: 0 };

        loop {
            phase = match phase {
                DraftPhase::Drafting { redraft } => {
                    match self.draft_once(ctx, &reminders, cancel).await {
                        Ok(draft) => DraftPhase::Judging { redraft, draft },
                        Err(SimulationError::Cancelled) => return Err(SimulationError::Cancelled),
                        Err(err) => {
                            warn!(redraft, error = %err, "drafting failed");
                            degradations.push(Degradation::DraftFallback {
                                error: err.to_string(),
                            });
                            let (draft, verdict) = last_judged.take().unwrap_or_else(|| {
                                (fallback_draft(), self.unjudged_verdict(&err))
                            });
                            DraftPhase::Accepted {
                                redraft: redraft.saturating_sub(1),
                                draft,
                                verdict,
                            }
                        }
                    }
                }
                DraftPhase::Judging { redraft, draft } => {
                    let input = JudgeInput {
                        profile: ctx.profile,
                        summary: ctx.summary,
                        last_reply: ctx.last_reply,
                        utterance: &draft.utterance,
                        actions: &draft.actions,
                    };
                    let (verdict, degradation) =
                        self.judge.judge(input, redraft + 1, cancel).await?;
                    degradations.extend(degradation);

                    if verdict.passes {
                        DraftPhase::Accepted { redraft, draft, verdict }
                    } else if redraft < self.max_redrafts {
                        debug!(redraft, score = verdict.score, "draft rejected, redrafting");
                        if let Some(reminder) = verdict.reminder.clone() {
                            reminders.push(reminder);
                        }
                        last_judged = Some((draft, verdict));
                        DraftPhase::Drafting { redraft: redraft + 1 }
                    } else {
                        info!(
                            attempts = redraft + 1,
                            last_score = verdict.score,
                            "judge rejected every draft, accepting the last one"
                        );
                        degradations.push(Degradation::JudgeRejectedMaxRetries {
                            attempts: redraft + 1,
                            last_score: verdict.score,
                        });
                        DraftPhase::Accepted { redraft, draft, verdict }
                    }
                }
                DraftPhase::Accepted { redraft, draft, verdict } => {
                    return Ok(AcceptedTurn {
                        user_text: draft.utterance,
                        actions: draft.actions,
                        verdict,
                        redrafts: redraft,
                        dropped_actions: draft.dropped,
                        degradations,
                    });
                }
            };
        }
    }

    async fn draft_once(
        &self,
        ctx: DraftContext<'_>,
        reminders: &[String],
        cancel: &CancellationToken,
    ) -> SimulationResult<Draft> {
        let request = prompts::draft_turn(
            ctx.profile,
            ctx.summary,
            ctx.ui,
            ctx.last_reply,
            reminders,
            self.max_actions,
        );
        let raw: RawDraft = self.gateway.generate_json(request, cancel).await?;
        let (actions, dropped) = parse_actions(&raw.actions, self.max_actions);
        if dropped > 0 {
            debug!(dropped, kept = actions.len(), "dropped draft actions");
        }
        Ok(Draft {
            utterance: raw.utterance,
            actions,
            dropped,
        })
    }

    fn unjudged_verdict(&self, err: &SimulationError) -> JudgeVerdict {
        JudgeVerdict::new(
            0.0,
            self.judge.pass_threshold(),
            format!("no draft could be generated: {err}"),
            None,
        )
    }
}

fn fallback_draft() -> Draft {
    Draft {
        utterance: FALLBACK_UTTERANCE.to_string(),
        actions: Vec::new(),
        dropped: 0,
    }
}
