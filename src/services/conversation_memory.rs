//! Conversation memory: the rolling summary fused after every turn.
//!
//! Fusion asks the oracle to rewrite the narrative with the new turn folded
//! in and falls back to plain concatenation when the oracle is unavailable.
//! Salient commitments (money amounts, caps, mileage, location) are pinned
//! separately and re-attached after every fusion, so an oracle that forgets
//! them cannot lose them.

use std::sync::LazyLock;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::{Action, ConversationSummary, Degradation, MemoryConfig};
use crate::services::oracle_gateway::OracleGateway;
use crate::services::prompts;

const MAX_PINNED_FACTS: usize = 16;

static SALIENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \$\s?\d[\d,]*(?:\.\d+)?\s?[km]?\b
        | \b\d+(?:\.\d+)?\s?k\b
        | \b(?:budget|cap|max(?:imum)?|at\s+most|no\s+more\s+than|afford)\b
        | \b(?:live[sd]?|living|located|based)\s+(?:in|near|around)\b
        | \b(?:mile(?:s|age)?|odometer)\b",
    )
    .expect("salient-fact pattern is valid")
});

/// Whether a sentence states a commitment worth pinning.
pub fn is_salient(sentence: &str) -> bool {
    SALIENT.is_match(sentence)
}

/// Salient sentences of `text`, in order.
pub fn salient_facts(text: &str) -> Vec<String> {
    split_sentences(text)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty() && is_salient(s))
        .map(ToString::to_string)
        .collect()
}

/// A fused summary that has not been committed yet.
#[derive(Debug, Clone)]
pub struct Fusion {
    pub summary: ConversationSummary,
    pub degradation: Option<Degradation>,
}

/// Owns one run's summary. Only the controller for that run mutates it.
pub struct ConversationMemory {
    gateway: OracleGateway,
    max_summary_chars: usize,
    excerpt_chars: usize,
    summary: ConversationSummary,
}

impl ConversationMemory {
    /// Start from the facts stated in the persona seed.
    pub fn new(gateway: OracleGateway, config: &MemoryConfig, seed: &str) -> Self {
        let mut pinned = Vec::new();
        pin(&mut pinned, salient_facts(seed));
        Self {
            gateway,
            max_summary_chars: config.max_summary_chars,
            excerpt_chars: config.excerpt_chars,
            summary: ConversationSummary::new(pinned),
        }
    }

    pub const fn summary(&self) -> &ConversationSummary {
        &self.summary
    }

    pub fn excerpt(&self) -> String {
        self.summary.excerpt(self.excerpt_chars)
    }

    /// Fold one turn into a new summary without committing it.
    ///
    /// Only cancellation is an error; oracle failure degrades to
    /// concatenation.
    pub async fn fuse(
        &self,
        user_text: &str,
        assistant_text: &str,
        actions: &[Action],
        cancel: &CancellationToken,
    ) -> SimulationResult<Fusion> {
        let mut pinned = self.summary.pinned_facts.clone();
        pin(&mut pinned, salient_facts(user_text));

        let request = prompts::fuse_summary(
            &self.summary,
            user_text,
            assistant_text,
            actions,
            self.max_summary_chars,
        );
        let (narrative, degradation) = match self.gateway.generate_text(request, cancel).await {
            Ok(text) => (text, None),
            Err(SimulationError::Cancelled) => return Err(SimulationError::Cancelled),
            Err(err) => {
                warn!(error = %err, "summary fusion failed, concatenating");
                let joined =
                    concatenate(&self.summary.narrative, user_text, assistant_text, actions);
                let degradation = Degradation::SummaryFallback {
                    error: err.to_string(),
                };
                (joined, Some(degradation))
            }
        };

        let budget = narrative_budget(self.max_summary_chars, &pinned);
        let summary = ConversationSummary {
            pinned_facts: pinned,
            narrative: trim_narrative(&narrative, budget),
            version: self.summary.version + 1,
        };
        debug!(
            version = summary.version,
            chars = summary.narrative.chars().count(),
            pinned = summary.pinned_facts.len(),
            "summary fused"
        );
        Ok(Fusion {
            summary,
            degradation,
        })
    }

    /// Replace the summary with a fused one. Versions only move forward.
    pub fn commit(&mut self, summary: ConversationSummary) {
        if summary.version > self.summary.version {
            self.summary = summary;
        }
    }
}

/// Pin new salient facts; returns how many were skipped because the pin
/// list is full.
fn pin(pinned: &mut Vec<String>, facts: Vec<String>) -> usize {
    let mut skipped = 0;
    for fact in facts {
        if pinned.iter().any(|p| p.eq_ignore_ascii_case(&fact)) {
            continue;
        }
        if pinned.len() >= MAX_PINNED_FACTS {
            debug!(fact = %fact, limit = MAX_PINNED_FACTS, "pin list full, fact not pinned");
            skipped += 1;
            continue;
        }
        pinned.push(fact);
    }
    skipped
}

fn narrative_budget(max_chars: usize, pinned: &[String]) -> usize {
    let pinned_chars: usize = pinned.iter().map(|f| f.chars().count() + 3).sum();
    max_chars.saturating_sub(pinned_chars).max(max_chars / 4)
}

fn concatenate(prior: &str, user_text: &str, assistant_text: &str, actions: &[Action]) -> String {
    let mut out = String::from(prior.trim());
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!("User: {}", user_text.trim()));
    if !actions.is_empty() {
        let kinds: Vec<&str> = actions.iter().map(Action::kind).collect();
        out.push_str(&format!(" [actions: {}]", kinds.join(", ")));
    }
    out.push('\n');
    out.push_str(&format!("Assistant: {}", assistant_text.trim()));
    out
}

/// Keep `text` within `budget` characters.
///
/// Oldest non-salient sentences go first, then the oldest salient ones. A
/// single sentence that still does not fit keeps its tail.
pub fn trim_narrative(text: &str, budget: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= budget {
        return text.to_string();
    }

    let mut sentences: Vec<&str> = split_sentences(text);
    let total = |s: &[&str]| s.iter().map(|x| x.chars().count()).sum::<usize>();

    while total(&sentences) > budget {
        let victim = sentences
            .iter()
            .position(|s| !is_salient(s))
            .unwrap_or(0);
        if sentences.len() <= 1 {
            break;
        }
        sentences.remove(victim);
    }

    let joined = sentences.concat();
    let joined = joined.trim();
    let count = joined.chars().count();
    if count <= budget {
        joined.to_string()
    } else {
        joined.chars().skip(count - budget).collect()
    }
}

/// Split on sentence terminators and newlines, keeping the delimiters.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().is_none_or(|(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            let mut end = i + c.len_utf8();
            while let Some((j, ws)) = chars.peek().copied() {
                if ws.is_whitespace() {
                    end = j + ws.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            out.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}
