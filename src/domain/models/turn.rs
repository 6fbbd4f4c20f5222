//! Per-turn records and the degradations they carry.

use serde::{Deserialize, Serialize};

use super::emotion::{EmotionDelta, EmotionScores, StopResult};
use super::persona::PersonaFacet;
use super::ui_state::{Action, UiState};
use super::verdict::JudgeVerdict;

/// A non-fatal failure that was absorbed locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Facet generation failed twice; the neutral default was used.
    FacetDefaulted { facet: PersonaFacet, error: String },
    /// No draft could be generated; a fallback utterance was sent.
    DraftFallback { error: String },
    /// The last draft was accepted despite failing the judge.
    JudgeRejectedMaxRetries { attempts: u32, last_score: f64 },
    /// The judge could not be reached for one attempt.
    JudgeUnavailable { attempt: u32, error: String },
    /// Summary fusion fell back to plain concatenation.
    SummaryFallback { error: String },
    /// The emotion critic failed; a zero delta was applied.
    CriticFallback { error: String },
}

/// A user turn accepted by the drafter, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedTurn {
    pub user_text: String,
    pub actions: Vec<Action>,
    pub verdict: JudgeVerdict,
    /// Redrafts after the first draft (0..=max_redrafts).
    pub redrafts: u32,
    /// Actions dropped as unknown, malformed, or over the cap.
    pub dropped_actions: usize,
    pub degradations: Vec<Degradation>,
}

/// Critic output for one assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionAssessment {
    pub delta: EmotionDelta,
    #[serde(default)]
    pub rationale: String,
}

/// One fully completed step of a simulated conversation.
///
/// Only ever appended once all parts of the step have succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based step index.
    pub step: u32,
    pub user_text: String,
    pub assistant_text: String,
    pub actions: Vec<Action>,
    pub ui_state: UiState,
    pub summary_excerpt: String,
    pub emotion: EmotionScores,
    #[serde(default)]
    pub emotion_rationale: String,
    pub verdict: JudgeVerdict,
    pub redrafts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradation_is_tagged() {
        let d = Degradation::FacetDefaulted {
            facet: PersonaFacet::Intent,
            error: "timeout".to_string(),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "facet_defaulted");
        assert_eq!(json["facet"], "intent");
    }
}
