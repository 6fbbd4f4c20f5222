//! Anthropic Messages API oracle.
//!
//! Sends each [`OracleRequest`] as a single-turn Messages call. Rate limits
//! and server errors (429, 5xx, 529) are retried with exponential backoff;
//! client errors are returned straight away. Requests are throttled to the
//! configured rate before they leave the process.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::models::OracleConfig;
use crate::domain::ports::{Oracle, OracleError, OracleRequest, OracleResponse};

/// Backoff bounds for transient provider errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Give up once this much time has been spent retrying
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(8),
            max_elapsed: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

pub struct AnthropicOracle {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_version: String,
    max_tokens: u32,
    temperature: f32,
    limiter: DefaultDirectRateLimiter,
    retry: RetryPolicy,
}

impl AnthropicOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::NotConfigured(format!("failed to create HTTP client: {e}")))?;
        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.resolved_api_key(),
            api_version: config.api_version.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            limiter: RateLimiter::direct(Quota::per_second(rps)),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn build_request<'a>(&'a self, request: &'a OracleRequest) -> MessagesRequest<'a> {
        let mut system = request.system_prompt.clone();
        if let Some(schema) = &request.schema {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str("Respond with a single JSON object matching this schema and nothing else:\n");
            system.push_str(&schema.to_string());
        }

        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: (!system.is_empty()).then_some(system),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            temperature: self.temperature,
        }
    }

    async fn send_once(
        &self,
        api_key: &str,
        body: &MessagesRequest<'_>,
    ) -> Result<String, backoff::Error<OracleError>> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .json(body)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(OracleError::Network(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify(status, message));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| backoff::Error::permanent(OracleError::Malformed(e.to_string())))?;

        let text = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(text)
    }
}

fn classify(status: StatusCode, message: String) -> backoff::Error<OracleError> {
    let code = status.as_u16();
    if status == StatusCode::TOO_MANY_REQUESTS {
        backoff::Error::transient(OracleError::RateLimited(message))
    } else if status.is_server_error() || code == 529 {
        backoff::Error::transient(OracleError::Provider {
            status: code,
            message,
        })
    } else {
        backoff::Error::permanent(OracleError::Provider {
            status: code,
            message,
        })
    }
}

#[async_trait]
impl Oracle for AnthropicOracle {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| OracleError::NotConfigured("ANTHROPIC_API_KEY not set".to_string()))?;
        let body = self.build_request(&request);

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry.initial_interval)
            .with_max_interval(self.retry.max_interval)
            .with_max_elapsed_time(Some(self.retry.max_elapsed))
            .build();

        let mut attempt = 0u32;
        let text = backoff::future::retry(policy, || {
            attempt += 1;
            let current = attempt;
            let body = &body;
            async move {
                let result = self.send_once(api_key, body).await;
                if let Err(backoff::Error::Transient { err, .. }) = &result {
                    warn!(attempt = current, error = %err, "transient oracle error");
                }
                result
            }
        })
        .await?;

        debug!(purpose = %request.purpose, chars = text.len(), "oracle responded");
        Ok(OracleResponse::new(text))
    }
}
