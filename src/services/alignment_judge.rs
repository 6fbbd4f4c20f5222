//! Alignment judge: scores a drafted user turn against the persona.

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::{
    Action, ConversationSummary, Degradation, JudgeConfig, JudgeVerdict, PersonaProfile,
};
use crate::services::oracle_gateway::OracleGateway;
use crate::services::prompts;

#[derive(Debug, Deserialize)]
struct RawVerdict {
    score: f64,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    reminder: Option<String>,
}

/// What the judge looks at for one draft.
#[derive(Debug, Clone, Copy)]
pub struct JudgeInput<'a> {
    pub profile: &'a PersonaProfile,
    pub summary: &'a ConversationSummary,
    pub last_reply: Option<&'a str>,
    pub utterance: &'a str,
    pub actions: &'a [Action],
}

pub struct AlignmentJudge {
    gateway: OracleGateway,
    pass_threshold: f64,
}

impl AlignmentJudge {
    pub const fn new(gateway: OracleGateway, pass_threshold: f64) -> Self {
        Self {
            gateway,
            pass_threshold,
        }
    }

    pub fn from_config(gateway: OracleGateway, config: &JudgeConfig) -> Self {
        Self::new(gateway, config.pass_threshold)
    }

    pub const fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    /// Judge one draft.
    ///
    /// An unreachable judge yields a failing verdict plus a degradation, so
    /// the redraft loop keeps its bound. Only cancellation is an error.
    pub async fn judge(
        &self,
        input: JudgeInput<'_>,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> SimulationResult<(JudgeVerdict, Option<Degradation>)> {
        let request = prompts::judge_turn(
            input.profile,
            input.summary,
            input.last_reply,
            input.utterance,
            input.actions,
        );
        match self.gateway.generate_json::<RawVerdict>(request, cancel).await {
            Ok(raw) => {
                let verdict =
                    JudgeVerdict::new(raw.score, self.pass_threshold, raw.feedback, raw.reminder);
                debug!(attempt, score = verdict.score, passes = verdict.passes, "draft judged");
                Ok((verdict, None))
            }
            Err(SimulationError::Cancelled) => Err(SimulationError::Cancelled),
            Err(err) => {
                warn!(attempt, error = %err, "judge unavailable");
                let degradation = Degradation::JudgeUnavailable {
                    attempt,
                    error: err.to_string(),
                };
                Ok((JudgeVerdict::unavailable(&err), Some(degradation)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::{ScriptedOracle, ScriptedReply};
    use crate::domain::ports::{OracleError, OraclePurpose};
    use std::sync::Arc;
    use std::time::Duration;

    fn judge(oracle: ScriptedOracle) -> AlignmentJudge {
        let gateway = OracleGateway::new(Arc::new(oracle), Duration::from_secs(5), 2);
        AlignmentJudge::new(gateway, 0.75)
    }

    async fn run(judge: &AlignmentJudge) -> (JudgeVerdict, Option<Degradation>) {
        let profile = PersonaProfile::neutral("seed");
        let summary = ConversationSummary::default();
        let input = JudgeInput {
            profile: &profile,
            summary: &summary,
            last_reply: None,
            utterance: "hey, any cheap SUVs?",
            actions: &[],
        };
        judge.judge(input, 1, &CancellationToken::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_passing_score() {
        let (verdict, degradation) = run(&judge(ScriptedOracle::new())).await;
        assert!(verdict.passes);
        assert!(degradation.is_none());
    }

    #[tokio::test]
    async fn test_failing_score_carries_reminder() {
        let oracle = ScriptedOracle::new().with_default(
            OraclePurpose::JudgeTurn,
            ScriptedReply::judge(0.4, "too formal for this persona"),
        );
        let (verdict, _) = run(&judge(oracle)).await;
        assert!(!verdict.passes);
        assert!(verdict.reminder.unwrap().contains("too formal"));
    }

    #[tokio::test]
    async fn test_unreachable_judge_degrades() {
        let oracle = ScriptedOracle::new().with_default(
            OraclePurpose::JudgeTurn,
            ScriptedReply::failure(OracleError::Network("refused".into())),
        );
        let (verdict, degradation) = run(&judge(oracle)).await;
        assert!(!verdict.passes);
        assert!(verdict.reminder.is_some());
        assert!(matches!(
            degradation,
            Some(Degradation::JudgeUnavailable { attempt: 1, .. })
        ));
    }
}
