//! HTTP client for the recommendation agent under test.
//!
//! The agent answers either with a single JSON body or with a stream of
//! chunks (server-sent events or newline-delimited JSON). Streams are
//! folded into one [`AgentResponse`]: text chunks are concatenated and the
//! last non-empty product and quick-reply lists win.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::models::AgentConfig;
use crate::domain::ports::{AgentError, AgentRequest, AgentResponse, AgentUnderTest, Product};

/// One streamed chunk. Every field is optional; unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct Chunk {
    #[serde(default, alias = "text", alias = "delta")]
    response_text: Option<String>,
    #[serde(default)]
    products: Option<Vec<Product>>,
    #[serde(default)]
    quick_replies: Option<Vec<String>>,
}

#[derive(Debug, Default)]
struct StreamAggregate {
    text: String,
    products: Vec<Product>,
    quick_replies: Vec<String>,
    chunks: usize,
}

impl StreamAggregate {
    fn push(&mut self, chunk: Chunk) {
        self.chunks += 1;
        if let Some(text) = chunk.response_text {
            self.text.push_str(&text);
        }
        if let Some(products) = chunk.products.filter(|p| !p.is_empty()) {
            self.products = products;
        }
        if let Some(replies) = chunk.quick_replies.filter(|r| !r.is_empty()) {
            self.quick_replies = replies;
        }
    }

    /// Feed one line of the stream. Blank lines, SSE comments and the
    /// `[DONE]` marker are skipped.
    fn push_line(&mut self, line: &str) -> Result<(), AgentError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return Ok(());
        }
        let payload = match line.strip_prefix("data:") {
            Some(rest) => rest.trim_start(),
            None if line.starts_with("event:") || line.starts_with("id:") => return Ok(()),
            None => line,
        };
        if payload == "[DONE]" {
            return Ok(());
        }
        let chunk: Chunk = serde_json::from_str(payload)
            .map_err(|e| AgentError::Malformed(format!("bad stream chunk: {e}")))?;
        self.push(chunk);
        Ok(())
    }

    fn finish(self) -> Result<AgentResponse, AgentError> {
        if self.chunks == 0 {
            return Err(AgentError::Malformed("empty stream".to_string()));
        }
        let mut response = AgentResponse::text(self.text).with_products(self.products);
        response.quick_replies = self.quick_replies;
        Ok(response)
    }
}

fn is_stream(content_type: &str) -> bool {
    content_type.starts_with("text/event-stream")
        || content_type.starts_with("application/x-ndjson")
        || content_type.starts_with("application/jsonl")
}

pub struct HttpAgentClient {
    client: Client,
    endpoint: String,
}

impl HttpAgentClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        Self::new(&config.endpoint, Duration::from_secs(config.timeout_secs))
    }

    async fn read_stream(response: reqwest::Response) -> Result<AgentResponse, AgentError> {
        let mut aggregate = StreamAggregate::default();
        let mut buffer: Vec<u8> = Vec::new();
        let mut bytes = response.bytes_stream();

        while let Some(next) = bytes.next().await {
            let piece = next.map_err(map_reqwest)?;
            buffer.extend_from_slice(&piece);
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                aggregate.push_line(&decode_line(line)?)?;
            }
        }
        aggregate.push_line(&decode_line(buffer)?)?;
        aggregate.finish()
    }
}

/// Lines are decoded only once complete, so a character split across
/// network chunks survives intact.
fn decode_line(line: Vec<u8>) -> Result<String, AgentError> {
    String::from_utf8(line)
        .map_err(|e| AgentError::Malformed(format!("invalid UTF-8 in stream: {e}")))
}

fn map_reqwest(err: reqwest::Error) -> AgentError {
    if err.is_timeout() {
        AgentError::Timeout
    } else if err.is_decode() {
        AgentError::Malformed(err.to_string())
    } else {
        AgentError::Transport(err.to_string())
    }
}

#[async_trait]
impl AgentUnderTest for HttpAgentClient {
    #[instrument(skip(self, request), fields(endpoint = %self.endpoint))]
    async fn respond(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "application/json, text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_ascii_lowercase();

        let reply = if is_stream(&content_type) {
            Self::read_stream(response).await?
        } else {
            let body = response.text().await.map_err(map_reqwest)?;
            serde_json::from_str::<AgentResponse>(&body)
                .map_err(|e| AgentError::Malformed(e.to_string()))?
        };

        debug!(
            chars = reply.response_text.len(),
            products = reply.products.len(),
            "agent replied"
        );
        Ok(reply)
    }
}
