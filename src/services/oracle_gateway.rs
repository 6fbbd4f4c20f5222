//! Oracle gateway.
//!
//! Every oracle call made by the core goes through here so the suspension
//! contract is enforced in one place: a per-call timeout, a bounded number
//! of attempts, and lenient decoding of structured answers. A decode
//! failure counts as a failed attempt like a timeout does.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::OracleConfig;
use crate::domain::ports::{Oracle, OracleError, OracleRequest};

/// Shared handle used by every service that talks to the oracle.
#[derive(Clone)]
pub struct OracleGateway {
    oracle: Arc<dyn Oracle>,
    timeout: Duration,
    max_attempts: u32,
}

impl OracleGateway {
    pub fn new(oracle: Arc<dyn Oracle>, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            oracle,
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(oracle: Arc<dyn Oracle>, config: &OracleConfig) -> Self {
        Self::new(
            oracle,
            Duration::from_secs(config.timeout_secs),
            config.max_attempts,
        )
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Generate plain text.
    pub async fn generate_text(
        &self,
        request: OracleRequest,
        cancel: &CancellationToken,
    ) -> SimulationResult<String> {
        self.with_attempts(&request, cancel, |text| {
            let text = text.trim();
            if text.is_empty() {
                Err(SimulationError::OracleMalformedResponse(
                    "empty response".to_string(),
                ))
            } else {
                Ok(text.to_string())
            }
        })
        .await
    }

    /// Generate and decode a structured answer.
    pub async fn generate_json<T: DeserializeOwned>(
        &self,
        request: OracleRequest,
        cancel: &CancellationToken,
    ) -> SimulationResult<T> {
        self.with_attempts(&request, cancel, decode_json::<T>).await
    }

    async fn with_attempts<T, F>(
        &self,
        request: &OracleRequest,
        cancel: &CancellationToken,
        decode: F,
    ) -> SimulationResult<T>
    where
        F: Fn(&str) -> SimulationResult<T>,
    {
        let mut last_error = SimulationError::OracleUnavailable("no attempt made".to_string());

        for attempt in 1..=self.max_attempts {
            let outcome = cancellable(cancel, self.call_once(request.clone())).await?;
            match outcome.and_then(|text| decode(&text)) {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            purpose = %request.purpose,
                            attempt,
                            "oracle call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        purpose = %request.purpose,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "oracle attempt failed"
                    );
                    last_error = err;
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error)
    }

    async fn call_once(&self, request: OracleRequest) -> SimulationResult<String> {
        match tokio::time::timeout(self.timeout, self.oracle.generate(request)).await {
            Ok(Ok(response)) => Ok(response.text),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(SimulationError::OracleTimeout(self.timeout)),
        }
    }
}

impl From<OracleError> for SimulationError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Malformed(msg) => Self::OracleMalformedResponse(msg),
            other => Self::OracleUnavailable(other.to_string()),
        }
    }
}

/// Race a suspension point against the run's cancellation token.
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> SimulationResult<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SimulationError::Cancelled),
        value = fut => Ok(value),
    }
}

/// Decode JSON out of model output that may wrap it in code fences or prose.
pub fn decode_json<T: DeserializeOwned>(text: &str) -> SimulationResult<T> {
    let candidate = extract_json(text).ok_or_else(|| {
        SimulationError::OracleMalformedResponse(format!(
            "no JSON object in response: {}",
            preview(text)
        ))
    })?;
    serde_json::from_str(candidate).map_err(|e| {
        SimulationError::OracleMalformedResponse(format!("{e}: {}", preview(candidate)))
    })
}

fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.rsplit_once("```").map(|(body, _)| body.trim()))
        .unwrap_or(trimmed);

    if unfenced.starts_with('{') || unfenced.starts_with('[') {
        return Some(unfenced);
    }

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (end > start).then(|| &unfenced[start..=end])
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        format!("{}…", text.chars().take(MAX).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{OraclePurpose, OracleResponse};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: u32,
    }

    struct FlakyOracle {
        calls: AtomicU32,
        fail_first: u32,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Oracle for FlakyOracle {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, _request: OracleRequest) -> Result<OracleResponse, OracleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if n <= self.fail_first {
                Ok(OracleResponse::new("not json at all"))
            } else {
                Ok(OracleResponse::new("```json\n{\"value\": 7}\n```"))
            }
        }
    }

    fn request() -> OracleRequest {
        OracleRequest::new(OraclePurpose::JudgeTurn, "sys", "prompt")
            .with_schema(serde_json::json!({}))
    }

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(decode_json::<Answer>("{\"value\": 1}").unwrap(), Answer { value: 1 });
        assert_eq!(
            decode_json::<Answer>("Sure! Here it is: {\"value\": 2} hope that helps").unwrap(),
            Answer { value: 2 }
        );
        assert_eq!(
            decode_json::<Answer>("```\n{\"value\": 3}\n```").unwrap(),
            Answer { value: 3 }
        );
        assert!(matches!(
            decode_json::<Answer>("nothing here"),
            Err(SimulationError::OracleMalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_answer_is_retried_once() {
        let oracle = Arc::new(FlakyOracle {
            calls: AtomicU32::new(0),
            fail_first: 1,
            delay: None,
        });
        let gateway = OracleGateway::new(oracle.clone(), Duration::from_secs(1), 2);
        let answer: Answer = gateway
            .generate_json(request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, Answer { value: 7 });
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let oracle = Arc::new(FlakyOracle {
            calls: AtomicU32::new(0),
            fail_first: 5,
            delay: None,
        });
        let gateway = OracleGateway::new(oracle.clone(), Duration::from_secs(1), 2);
        let result: SimulationResult<Answer> = gateway
            .generate_json(request(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SimulationError::OracleMalformedResponse(_))));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported() {
        let oracle = Arc::new(FlakyOracle {
            calls: AtomicU32::new(0),
            fail_first: 0,
            delay: Some(Duration::from_secs(30)),
        });
        let gateway = OracleGateway::new(oracle, Duration::from_secs(1), 1);
        let result: SimulationResult<Answer> = gateway
            .generate_json(request(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SimulationError::OracleTimeout(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let oracle = Arc::new(FlakyOracle {
            calls: AtomicU32::new(0),
            fail_first: 0,
            delay: None,
        });
        let gateway = OracleGateway::new(oracle.clone(), Duration::from_secs(1), 2);
        let token = CancellationToken::new();
        token.cancel();
        let result = gateway.generate_text(request(), &token).await;
        assert!(matches!(result, Err(SimulationError::Cancelled)));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }
}
