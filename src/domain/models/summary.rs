//! Rolling conversation summary.

use serde::{Deserialize, Serialize};

/// Accumulated narrative of a conversation.
///
/// `pinned_facts` hold persona commitments (budget, location, mileage…)
/// and are never trimmed. `narrative` is the fused, trimmable part. The
/// version increases by exactly one per fusion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub pinned_facts: Vec<String>,
    pub narrative: String,
    pub version: u64,
}

impl ConversationSummary {
    pub fn new(pinned_facts: Vec<String>) -> Self {
        Self {
            pinned_facts,
            narrative: String::new(),
            version: 0,
        }
    }

    /// Full text as read by the drafter and the critic.
    pub fn text(&self) -> String {
        let mut out = String::new();
        if !self.pinned_facts.is_empty() {
            out.push_str("Known facts:\n");
            for fact in &self.pinned_facts {
                out.push_str("- ");
                out.push_str(fact);
                out.push('\n');
            }
        }
        if !self.narrative.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&self.narrative);
        }
        out
    }

    /// Trailing slice of the narrative, used as the per-turn excerpt.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let chars: Vec<char> = self.narrative.chars().collect();
        if chars.len() <= max_chars {
            return self.narrative.clone();
        }
        chars[chars.len() - max_chars..].iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned_facts.is_empty() && self.narrative.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_lists_pinned_facts_first() {
        let mut summary = ConversationSummary::new(vec!["Budget is $30k".to_string()]);
        summary.narrative = "User asked for SUVs.".to_string();
        let text = summary.text();
        assert!(text.starts_with("Known facts:\n- Budget is $30k"));
        assert!(text.ends_with("User asked for SUVs."));
    }

    #[test]
    fn test_excerpt_takes_tail() {
        let mut summary = ConversationSummary::default();
        summary.narrative = "abcdefghij".to_string();
        assert_eq!(summary.excerpt(4), "ghij");
        assert_eq!(summary.excerpt(40), "abcdefghij");
    }

    #[test]
    fn test_empty() {
        assert!(ConversationSummary::default().is_empty());
        assert!(!ConversationSummary::new(vec!["x".into()]).is_empty());
    }
}
