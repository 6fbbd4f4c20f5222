//! Emotion / stop scorer.
//!
//! Holds the two discounted accumulators for one run and decides when the
//! run stops. States are `Running` and `Stopped(StopResult)`; once stopped
//! the scores are frozen.

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::{
    ConversationSummary, Degradation, EmotionAssessment, EmotionConfig, EmotionDelta,
    EmotionScores, PersonaProfile, StopResult, Thresholds,
};
use crate::services::oracle_gateway::OracleGateway;
use crate::services::prompts;

#[derive(Debug, Deserialize)]
struct RawCritique {
    #[serde(alias = "positive")]
    delta_positive: f64,
    #[serde(alias = "negative")]
    delta_negative: f64,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScorerState {
    Running,
    Stopped(StopResult),
}

pub struct EmotionScorer {
    gateway: OracleGateway,
    gamma: f64,
    cap: f64,
    thresholds: Thresholds,
    scores: EmotionScores,
    state: ScorerState,
}

impl EmotionScorer {
    pub fn new(gateway: OracleGateway, thresholds: Thresholds, config: &EmotionConfig) -> Self {
        Self {
            gateway,
            gamma: config.gamma,
            cap: config.cap,
            thresholds,
            scores: EmotionScores::default(),
            state: ScorerState::Running,
        }
    }

    pub const fn scores(&self) -> EmotionScores {
        self.scores
    }

    pub const fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub const fn state(&self) -> ScorerState {
        self.state
    }

    pub const fn stop_result(&self) -> Option<StopResult> {
        match self.state {
            ScorerState::Stopped(result) => Some(result),
            ScorerState::Running => None,
        }
    }

    /// Ask the critic how the persona reacts to `assistant_text`.
    ///
    /// A failed critic yields a zero delta and a degradation. Only
    /// cancellation is an error. Does not touch the scores.
    pub async fn assess(
        &self,
        assistant_text: &str,
        profile: &PersonaProfile,
        summary: &ConversationSummary,
        cancel: &CancellationToken,
    ) -> SimulationResult<(EmotionAssessment, Option<Degradation>)> {
        let request = prompts::critique_emotion(assistant_text, profile, summary);
        match self.gateway.generate_json::<RawCritique>(request, cancel).await {
            Ok(raw) => {
                let assessment = EmotionAssessment {
                    delta: EmotionDelta::new(raw.delta_positive, raw.delta_negative).clamped(),
                    rationale: raw.rationale,
                };
                Ok((assessment, None))
            }
            Err(SimulationError::Cancelled) => Err(SimulationError::Cancelled),
            Err(err) => {
                warn!(error = %err, "emotion critic failed, applying zero delta");
                let assessment = EmotionAssessment {
                    delta: EmotionDelta::default(),
                    rationale: String::new(),
                };
                Ok((
                    assessment,
                    Some(Degradation::CriticFallback {
                        error: err.to_string(),
                    }),
                ))
            }
        }
    }

    /// Apply one turn's delta and check the thresholds.
    ///
    /// Returns the stop result the first time a threshold is crossed. After
    /// that the scorer is terminal and further deltas are ignored.
    pub fn apply(&mut self, step: u32, delta: EmotionDelta) -> Option<StopResult> {
        if let ScorerState::Stopped(result) = self.state {
            warn!(step, "delta ignored after stop");
            return Some(result);
        }

        self.scores = self.scores.step(delta, self.gamma, self.cap);
        debug!(
            step,
            positive = self.scores.positive,
            negative = self.scores.negative,
            "emotion scores updated"
        );

        let channel = self.thresholds.crossed(&self.scores)?;
        let result = StopResult {
            triggering_channel: channel,
            step,
            scores: self.scores,
        };
        info!(step, %channel, "stop threshold crossed");
        self.state = ScorerState::Stopped(result);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::{ScriptedOracle, ScriptedReply};
    use crate::domain::models::StopChannel;
    use crate::domain::ports::{OracleError, OraclePurpose};
    use std::sync::Arc;
    use std::time::Duration;

    fn scorer(oracle: ScriptedOracle, thresholds: Thresholds) -> EmotionScorer {
        let gateway = OracleGateway::new(Arc::new(oracle), Duration::from_secs(5), 2);
        EmotionScorer::new(gateway, thresholds, &EmotionConfig::default())
    }

    #[test]
    fn test_positive_stop_at_third_step() {
        let mut scorer = scorer(ScriptedOracle::new(), Thresholds::new(0.6, 1.2));
        let delta = EmotionDelta::new(0.3, 0.0);
        assert!(scorer.apply(1, delta).is_none());
        assert!(scorer.apply(2, delta).is_none());
        let stop = scorer.apply(3, delta).unwrap();
        assert_eq!(stop.triggering_channel, StopChannel::Positive);
        assert_eq!(stop.step, 3);
        assert!((stop.scores.positive - 0.813).abs() < 1e-9);
    }

    #[test]
    fn test_frozen_after_stop() {
        let mut scorer = scorer(ScriptedOracle::new(), Thresholds::new(0.2, 1.2));
        let first = scorer.apply(1, EmotionDelta::new(0.5, 0.0)).unwrap();
        let again = scorer.apply(2, EmotionDelta::new(0.0, 1.0)).unwrap();
        assert_eq!(first, again);
        assert_eq!(scorer.scores(), first.scores);
        assert_eq!(scorer.state(), ScorerState::Stopped(first));
    }

    #[tokio::test]
    async fn test_assess_clamps_critic_delta() {
        let oracle = ScriptedOracle::new()
            .with_default(OraclePurpose::CritiqueEmotion, ScriptedReply::critic(4.0, -0.2));
        let scorer = scorer(oracle, Thresholds::new(1.0, 1.0));
        let (assessment, degradation) = scorer
            .assess(
                "here are 3 SUVs",
                &PersonaProfile::neutral("seed"),
                &ConversationSummary::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(degradation.is_none());
        assert!((assessment.delta.positive - 1.0).abs() < f64::EPSILON);
        assert!((assessment.delta.negative + 0.2).abs() < f64::EPSILON);
        assert_eq!(scorer.scores(), EmotionScores::default());
    }

    #[tokio::test]
    async fn test_failed_critic_is_zero_delta() {
        let oracle = ScriptedOracle::new().with_default(
            OraclePurpose::CritiqueEmotion,
            ScriptedReply::failure(OracleError::Network("down".into())),
        );
        let scorer = scorer(oracle, Thresholds::new(1.0, 1.0));
        let (assessment, degradation) = scorer
            .assess(
                "whatever",
                &PersonaProfile::neutral("seed"),
                &ConversationSummary::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(assessment.delta, EmotionDelta::default());
        assert!(matches!(degradation, Some(Degradation::CriticFallback { .. })));
    }
}
