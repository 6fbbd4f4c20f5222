//! Dual-channel emotion accumulators and the stop rule they drive.

use serde::{Deserialize, Serialize};

use super::config::EmotionConfig;
use super::persona::PersonaProfile;

/// Discounted positive/negative accumulators for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionScores {
    pub positive: f64,
    pub negative: f64,
}

impl EmotionScores {
    /// `score = clamp(gamma * score + delta, 0, cap)` on each channel.
    ///
    /// Deltas are clamped to [-1, 1] first. Pure: the result depends only
    /// on the previous scores, the delta and the run constants.
    #[must_use]
    pub fn step(&self, delta: EmotionDelta, gamma: f64, cap: f64) -> Self {
        let delta = delta.clamped();
        Self {
            positive: discount(self.positive, delta.positive, gamma, cap),
            negative: discount(self.negative, delta.negative, gamma, cap),
        }
    }

    pub fn value(&self, channel: StopChannel) -> f64 {
        match channel {
            StopChannel::Positive => self.positive,
            StopChannel::Negative => self.negative,
        }
    }
}

fn discount(previous: f64, delta: f64, gamma: f64, cap: f64) -> f64 {
    gamma.mul_add(previous, delta).clamp(0.0, cap)
}

/// Per-turn change reported by the emotion critic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionDelta {
    pub positive: f64,
    pub negative: f64,
}

impl EmotionDelta {
    pub const fn new(positive: f64, negative: f64) -> Self {
        Self { positive, negative }
    }

    #[must_use]
    pub fn clamped(self) -> Self {
        let clamp = |v: f64| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        Self {
            positive: clamp(self.positive),
            negative: clamp(self.negative),
        }
    }
}

/// Channel whose threshold ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopChannel {
    Positive,
    Negative,
}

impl std::fmt::Display for StopChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => f.write_str("positive"),
            Self::Negative => f.write_str("negative"),
        }
    }
}

/// Stop thresholds, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub positive_threshold: f64,
    pub negative_threshold: f64,
}

impl Thresholds {
    pub const fn new(positive_threshold: f64, negative_threshold: f64) -> Self {
        Self {
            positive_threshold,
            negative_threshold,
        }
    }

    pub fn value(&self, channel: StopChannel) -> f64 {
        match channel {
            StopChannel::Positive => self.positive_threshold,
            StopChannel::Negative => self.negative_threshold,
        }
    }

    /// Derive thresholds from the persona.
    ///
    /// Fixed thresholds in the config win outright. Otherwise the base
    /// thresholds are scaled by cues in the interaction style and intent:
    /// impatient shoppers give up sooner, decisive ones are satisfied
    /// sooner, and patient or cautious ones hold out longer.
    pub fn derive(profile: &PersonaProfile, config: &EmotionConfig) -> Self {
        if let Some(fixed) = config.thresholds {
            return fixed;
        }

        let cues = format!("{} {}", profile.interaction_style, profile.intent).to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| cues.contains(w));

        let mut negative = config.base_negative_threshold;
        if has(&["impatient", "demanding", "easily frustrated", "irritable", "hurried"]) {
            negative *= 0.75;
        }
        if has(&["patient", "easygoing", "easy-going", "relaxed", "tolerant"])
            && !has(&["impatient"])
        {
            negative *= 1.25;
        }

        let mut positive = config.base_positive_threshold;
        if has(&["decisive", "knows exactly", "quick to decide"]) {
            positive *= 0.8;
        }
        if has(&["cautious", "indecisive", "skeptical", "sceptical", "thorough"]) {
            positive *= 1.2;
        }

        let bound = |v: f64| v.clamp(f64::EPSILON, config.cap.max(f64::EPSILON));
        Self::new(bound(positive), bound(negative))
    }

    /// Channel whose threshold is crossed by `scores`, if any.
    ///
    /// When both cross on the same turn the larger excess
    /// `score - threshold` wins; an exact tie goes to the negative channel.
    pub fn crossed(&self, scores: &EmotionScores) -> Option<StopChannel> {
        let pos = scores.positive >= self.positive_threshold;
        let neg = scores.negative >= self.negative_threshold;
        match (pos, neg) {
            (false, false) => None,
            (true, false) => Some(StopChannel::Positive),
            (false, true) => Some(StopChannel::Negative),
            (true, true) => {
                let pos_excess = scores.positive - self.positive_threshold;
                let neg_excess = scores.negative - self.negative_threshold;
                if pos_excess > neg_excess {
                    Some(StopChannel::Positive)
                } else {
                    Some(StopChannel::Negative)
                }
            }
        }
    }
}

/// Terminal record of a threshold crossing. Created at most once per run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopResult {
    pub triggering_channel: StopChannel,
    pub step: u32,
    pub scores: EmotionScores,
}
