//! Alignment judge verdicts.

use serde::{Deserialize, Serialize};

/// Minimum judge score for a draft to pass.
pub const DEFAULT_PASS_THRESHOLD: f64 = 0.75;

/// Outcome of judging a single draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// Fidelity score in [0, 1].
    pub score: f64,
    pub passes: bool,
    pub feedback: String,
    /// Correction injected into the next draft. Present only when `passes` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<String>,
}

impl JudgeVerdict {
    /// Build a verdict, enforcing the score range and the reminder rule.
    pub fn new(
        score: f64,
        pass_threshold: f64,
        feedback: impl Into<String>,
        reminder: Option<String>,
    ) -> Self {
        let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        let passes = score >= pass_threshold;
        let feedback = feedback.into();
        let reminder = if passes {
            None
        } else {
            Some(
                reminder
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| default_reminder(&feedback)),
            )
        };
        Self {
            score,
            passes,
            feedback,
            reminder,
        }
    }

    /// Failing verdict used when the judge itself could not answer.
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self {
            score: 0.0,
            passes: false,
            feedback: format!("judge unavailable: {reason}"),
            reminder: Some(
                "Stay in character: keep to the persona's voice, constraints and intent.".to_string(),
            ),
        }
    }
}

fn default_reminder(feedback: &str) -> String {
    if feedback.trim().is_empty() {
        "Stay closer to the persona's writing style and shopping intent.".to_string()
    } else {
        format!("Fix this in the next attempt: {}", feedback.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_threshold_is_inclusive() {
        let v = JudgeVerdict::new(0.75, DEFAULT_PASS_THRESHOLD, "fine", None);
        assert!(v.passes);
        assert!(v.reminder.is_none());
    }

    #[test]
    fn test_failing_verdict_always_has_reminder() {
        let v = JudgeVerdict::new(0.4, DEFAULT_PASS_THRESHOLD, "too formal", None);
        assert!(!v.passes);
        assert_eq!(
            v.reminder.as_deref(),
            Some("Fix this in the next attempt: too formal")
        );
    }

    #[test]
    fn test_passing_verdict_drops_reminder() {
        let v = JudgeVerdict::new(0.9, DEFAULT_PASS_THRESHOLD, "ok", Some("ignored".into()));
        assert!(v.reminder.is_none());
    }

    #[test]
    fn test_score_is_clamped() {
        assert!((JudgeVerdict::new(1.7, 0.75, "", None).score - 1.0).abs() < f64::EPSILON);
        assert!(JudgeVerdict::new(-0.2, 0.75, "", None).score.abs() < f64::EPSILON);
        assert!(JudgeVerdict::new(f64::NAN, 0.75, "", None).score.abs() < f64::EPSILON);
    }
}
