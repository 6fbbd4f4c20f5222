//! Scripted oracle and agent doubles.
//!
//! Deterministic stand-ins for the two external collaborators, used by the
//! integration tests, the benchmark and `mimic run --dry-run`. Replies are
//! configured per [`OraclePurpose`]: queued replies are consumed first,
//! then the purpose's default repeats forever.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::models::PersonaFacet;
use crate::domain::ports::{
    AgentError, AgentRequest, AgentResponse, AgentUnderTest, Oracle, OracleError, OraclePurpose,
    OracleRequest, OracleResponse, Product,
};

/// One configured oracle answer.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    /// Output text
    pub output: String,
    /// Error returned instead of the output
    pub error: Option<OracleError>,
    /// Simulated latency
    pub delay: Option<Duration>,
}

impl ScriptedReply {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: None,
            delay: None,
        }
    }

    pub fn json(value: &serde_json::Value) -> Self {
        Self::text(value.to_string())
    }

    pub fn failure(error: OracleError) -> Self {
        Self {
            output: String::new(),
            error: Some(error),
            delay: None,
        }
    }

    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Draft answer with an utterance and raw action values.
    pub fn draft(utterance: &str, actions: &[serde_json::Value]) -> Self {
        Self::json(&json!({ "utterance": utterance, "actions": actions }))
    }

    pub fn judge(score: f64, feedback: &str) -> Self {
        Self::json(&json!({ "score": score, "feedback": feedback }))
    }

    pub fn critic(delta_positive: f64, delta_negative: f64) -> Self {
        Self::json(&json!({
            "delta_positive": delta_positive,
            "delta_negative": delta_negative,
            "rationale": "scripted",
        }))
    }
}

#[derive(Debug)]
struct Script {
    default: ScriptedReply,
    queued: VecDeque<ScriptedReply>,
    calls: usize,
}

/// Oracle answering from per-purpose scripts.
#[derive(Debug)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<OraclePurpose, Script>>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    /// Oracle whose defaults produce a calm, passing conversation.
    pub fn new() -> Self {
        let mut scripts = HashMap::new();
        for facet in PersonaFacet::ALL {
            scripts.insert(
                OraclePurpose::PersonaFacet(facet),
                Script::new(ScriptedReply::text(format!("Scripted {facet} for this shopper."))),
            );
        }
        scripts.insert(
            OraclePurpose::DraftTurn,
            Script::new(ScriptedReply::draft("Any SUVs under $30k near Denver?", &[])),
        );
        scripts.insert(
            OraclePurpose::JudgeTurn,
            Script::new(ScriptedReply::judge(0.9, "in character")),
        );
        scripts.insert(
            OraclePurpose::FuseSummary,
            Script::new(ScriptedReply::text("The shopper is comparing SUVs.")),
        );
        scripts.insert(
            OraclePurpose::CritiqueEmotion,
            Script::new(ScriptedReply::critic(0.0, 0.0)),
        );
        Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replace the repeating answer for `purpose`.
    #[must_use]
    pub fn with_default(self, purpose: OraclePurpose, reply: ScriptedReply) -> Self {
        lock(&self.scripts)
            .entry(purpose)
            .or_insert_with(|| Script::new(ScriptedReply::text("")))
            .default = reply;
        self
    }

    /// Queue a one-shot answer for `purpose`, served before the default.
    #[must_use]
    pub fn then(self, purpose: OraclePurpose, reply: ScriptedReply) -> Self {
        self.push(purpose, reply);
        self
    }

    pub fn push(&self, purpose: OraclePurpose, reply: ScriptedReply) {
        lock(&self.scripts)
            .entry(purpose)
            .or_insert_with(|| Script::new(ScriptedReply::text("")))
            .queued
            .push_back(reply);
    }

    /// Number of calls made for `purpose`.
    pub fn calls(&self, purpose: OraclePurpose) -> usize {
        lock(&self.scripts).get(&purpose).map_or(0, |s| s.calls)
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<OracleRequest> {
        lock(&self.requests).clone()
    }

    fn next_reply(&self, purpose: OraclePurpose) -> ScriptedReply {
        let mut scripts = lock(&self.scripts);
        match scripts.get_mut(&purpose) {
            Some(script) => {
                script.calls += 1;
                script
                    .queued
                    .pop_front()
                    .unwrap_or_else(|| script.default.clone())
            }
            None => ScriptedReply::failure(OracleError::NotConfigured(format!(
                "no script for {purpose}"
            ))),
        }
    }
}

impl Script {
    const fn new(default: ScriptedReply) -> Self {
        Self {
            default,
            queued: VecDeque::new(),
            calls: 0,
        }
    }
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        let reply = self.next_reply(request.purpose);
        lock(&self.requests).push(request);

        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        match reply.error {
            Some(err) => Err(err),
            None => Ok(OracleResponse::new(reply.output)),
        }
    }
}

/// One configured agent answer.
#[derive(Debug, Clone)]
pub enum AgentReply {
    Respond(AgentResponse),
    Fail(AgentError),
    /// Respond after a delay
    Slow(Duration, AgentResponse),
}

/// Agent replaying a script of replies, then repeating a default.
#[derive(Debug)]
pub struct ScriptedAgent {
    default: AgentReply,
    queued: Mutex<VecDeque<AgentReply>>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    /// Agent that always answers with `response`.
    pub fn always(response: AgentResponse) -> Self {
        Self {
            default: AgentReply::Respond(response),
            queued: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Agent that always recommends three SUVs.
    pub fn suv_dealer() -> Self {
        Self::always(three_suvs())
    }

    #[must_use]
    pub fn then(self, reply: AgentReply) -> Self {
        lock(&self.queued).push_back(reply);
        self
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<AgentRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl AgentUnderTest for ScriptedAgent {
    async fn respond(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        lock(&self.requests).push(request);
        let reply = lock(&self.queued)
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match reply {
            AgentReply::Respond(response) => Ok(response),
            AgentReply::Fail(err) => Err(err),
            AgentReply::Slow(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
        }
    }
}

/// "here are 3 SUVs" with three product cards.
pub fn three_suvs() -> AgentResponse {
    let products = [
        ("suv-1", "Subaru Forester"),
        ("suv-2", "Toyota RAV4"),
        ("suv-3", "Honda CR-V"),
    ]
    .into_iter()
    .map(|(id, title)| Product {
        id: id.to_string(),
        title: title.to_string(),
        extra: serde_json::Map::new(),
    })
    .collect();
    AgentResponse::text("here are 3 SUVs").with_products(products)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
