//! Oracle port: the language-model capability used for persona expansion,
//! drafting, judging, summary fusion and emotion critique.
//!
//! The core only assumes `generate(prompt, schema?) -> text`. Any provider
//! (or a scripted double) can sit behind this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::models::PersonaFacet;

/// What an oracle call is for. Lets providers and test doubles route calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "purpose", content = "facet", rename_all = "snake_case")]
pub enum OraclePurpose {
    PersonaFacet(PersonaFacet),
    DraftTurn,
    JudgeTurn,
    FuseSummary,
    CritiqueEmotion,
}

impl OraclePurpose {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PersonaFacet(_) => "persona_facet",
            Self::DraftTurn => "draft_turn",
            Self::JudgeTurn => "judge_turn",
            Self::FuseSummary => "fuse_summary",
            Self::CritiqueEmotion => "critique_emotion",
        }
    }
}

impl std::fmt::Display for OraclePurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PersonaFacet(facet) => write!(f, "persona_facet:{facet}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub purpose: OraclePurpose,
    /// Instructions framing the task.
    pub system_prompt: String,
    /// The task-specific prompt.
    pub prompt: String,
    /// JSON shape the answer must follow, when structured output is wanted.
    pub schema: Option<serde_json::Value>,
}

impl OracleRequest {
    pub fn new(
        purpose: OraclePurpose,
        system_prompt: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            purpose,
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            schema: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub const fn wants_json(&self) -> bool {
        self.schema.is_some()
    }
}

/// Raw text returned by the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResponse {
    pub text: String,
}

impl OracleResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Error types for oracle operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle not configured: {0}")]
    NotConfigured(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider error {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Port trait for oracle implementations
///
/// Implementations must be idempotent with respect to retries: callers
/// may issue the same request twice after a timeout.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Identifier used in logs ("anthropic", "scripted", …)
    fn name(&self) -> &str;

    /// Generate text (or JSON text, when `request.schema` is set)
    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse, OracleError>;
}
