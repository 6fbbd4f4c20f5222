//! Agent-under-test port.
//!
//! The recommendation agent being exercised is consumed as plain
//! request/response. Streaming transports are collapsed to their final
//! aggregated response by the adapter before reaching the controller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::models::Card;

/// Message sent to the agent on behalf of the simulated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    pub ui_context: serde_json::Value,
    pub meta: serde_json::Value,
}

/// A recommended product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

impl From<&Product> for Card {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            title: product.title.clone(),
        }
    }
}

/// The agent's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response_text: String,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub quick_replies: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AgentResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            response_text: text.into(),
            products: Vec::new(),
            quick_replies: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_products(mut self, products: Vec<Product>) -> Self {
        self.products = products;
        self
    }

    pub fn cards(&self) -> Vec<Card> {
        self.products.iter().map(Card::from).collect()
    }
}

/// Error types for agent calls
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("Agent request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Agent returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed agent response: {0}")]
    Malformed(String),
}

impl AgentError {
    /// Timeouts and transport failures may succeed on another attempt.
    /// Malformed payloads and HTTP errors are final.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }
}

/// Port trait for the recommendation agent under test
#[async_trait]
pub trait AgentUnderTest: Send + Sync {
    /// Send one user message and wait for the aggregated reply
    async fn respond(&self, request: AgentRequest) -> Result<AgentResponse, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_decodes_with_defaults_and_extras() {
        let json = serde_json::json!({
            "response_text": "here are 3 SUVs",
            "products": [{"id": "p1", "name": "Forester", "price": 28000}],
            "session_id": "abc"
        });
        let resp: AgentResponse = serde_json::from_value(json).unwrap();
        assert_eq!(resp.products[0].title, "Forester");
        assert_eq!(resp.products[0].extra["price"], 28000);
        assert!(resp.quick_replies.is_empty());
        assert_eq!(resp.extra["session_id"], "abc");
        assert_eq!(resp.cards()[0].id, "p1");
    }

    #[test]
    fn test_numeric_product_ids_are_accepted() {
        let json = serde_json::json!({"response_text": "ok", "products": [{"id": 42}]});
        let resp: AgentResponse = serde_json::from_value(json).unwrap();
        assert_eq!(resp.products[0].id, "42");
    }

    #[test]
    fn test_response_requires_text() {
        let json = serde_json::json!({"products": []});
        assert!(serde_json::from_value::<AgentResponse>(json).is_err());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(AgentError::Timeout.is_retryable());
        assert!(AgentError::Transport("reset".into()).is_retryable());
        assert!(!AgentError::Malformed("bad".into()).is_retryable());
    }
}
