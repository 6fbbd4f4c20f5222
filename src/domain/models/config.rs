use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::emotion::Thresholds;
use super::verdict::DEFAULT_PASS_THRESHOLD;

/// Hard ceiling on `simulation.max_steps`.
pub const MAX_STEPS_HARD_CAP: u32 = 30;

/// Main configuration structure for mimic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Turn loop settings
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Language-model oracle connection
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Agent-under-test connection
    #[serde(default)]
    pub agent: AgentConfig,

    /// Persona builder settings
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Alignment judge settings
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Conversation memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Emotion / stop scorer settings
    #[serde(default)]
    pub emotion: EmotionConfig,

    /// Parallel batch settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Session store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Event sink settings
    #[serde(default)]
    pub events: EventsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LogConfig,
}

/// Turn loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimulationConfig {
    /// Maximum turns per run (1-30)
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Cards shown per page of the result list
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Actions kept per turn; extra actions are truncated
    #[serde(default = "default_max_actions_per_turn")]
    pub max_actions_per_turn: usize,
}

const fn default_max_steps() -> u32 {
    8
}

const fn default_page_size() -> usize {
    3
}

const fn default_max_actions_per_turn() -> usize {
    5
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            page_size: default_page_size(),
            max_actions_per_turn: default_max_actions_per_turn(),
        }
    }
}

/// Oracle connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OracleConfig {
    /// Messages API base URL
    #[serde(default = "default_oracle_base_url")]
    pub base_url: String,

    /// Model identifier passed through to the provider
    #[serde(default = "default_oracle_model")]
    pub model: String,

    /// API key (falls back to ANTHROPIC_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API version header
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per call, including the first (2 = one retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Max tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Client-side rate limit
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_oracle_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_oracle_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

const fn default_oracle_timeout_secs() -> u64 {
    60
}

const fn default_max_attempts() -> u32 {
    2
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_requests_per_second() -> u32 {
    5
}

impl OracleConfig {
    /// Get API key from config or environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_base_url(),
            model: default_oracle_model(),
            api_key: None,
            api_version: default_api_version(),
            timeout_secs: default_oracle_timeout_secs(),
            max_attempts: default_max_attempts(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Agent-under-test configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Chat endpoint URL
    #[serde(default = "default_agent_endpoint")]
    pub endpoint: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per call for timeouts and transport errors
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_agent_endpoint() -> String {
    "http://127.0.0.1:8000/api/chat".to_string()
}

const fn default_agent_timeout_secs() -> u64 {
    60
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: default_agent_endpoint(),
            timeout_secs: default_agent_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Persona builder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PersonaConfig {
    /// Bounded wait for the whole four-facet fan-out
    #[serde(default = "default_build_deadline_secs")]
    pub build_deadline_secs: u64,
}

const fn default_build_deadline_secs() -> u64 {
    180
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            build_deadline_secs: default_build_deadline_secs(),
        }
    }
}

/// Alignment judge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JudgeConfig {
    /// Minimum score to accept a draft
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,

    /// Redrafts allowed after the first draft
    #[serde(default = "default_max_redrafts")]
    pub max_redrafts: u32,
}

const fn default_pass_threshold() -> f64 {
    DEFAULT_PASS_THRESHOLD
}

const fn default_max_redrafts() -> u32 {
    2
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            max_redrafts: default_max_redrafts(),
        }
    }
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryConfig {
    /// Upper bound on the narrative part of the summary
    #[serde(default = "default_max_summary_chars")]
    pub max_summary_chars: usize,

    /// Characters of narrative copied into each turn record
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

const fn default_max_summary_chars() -> usize {
    4000
}

const fn default_excerpt_chars() -> usize {
    400
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_summary_chars: default_max_summary_chars(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

/// Emotion / stop scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmotionConfig {
    /// Discount factor, fixed for a run (0.5-0.99)
    #[serde(default = "default_gamma")]
    pub gamma: f64,

    /// Upper clamp for both accumulators
    #[serde(default = "default_cap")]
    pub cap: f64,

    /// Positive threshold before persona scaling
    #[serde(default = "default_base_positive_threshold")]
    pub base_positive_threshold: f64,

    /// Negative threshold before persona scaling
    #[serde(default = "default_base_negative_threshold")]
    pub base_negative_threshold: f64,

    /// Fixed thresholds that bypass persona derivation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
}

const fn default_gamma() -> f64 {
    0.9
}

const fn default_cap() -> f64 {
    3.0
}

const fn default_base_positive_threshold() -> f64 {
    1.5
}

const fn default_base_negative_threshold() -> f64 {
    1.2
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            gamma: default_gamma(),
            cap: default_cap(),
            base_positive_threshold: default_base_positive_threshold(),
            base_negative_threshold: default_base_negative_threshold(),
            thresholds: None,
        }
    }
}

/// Parallel batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Runs executing at once
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

const fn default_max_concurrent_runs() -> usize {
    4
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: default_max_concurrent_runs(),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    ".mimic/sessions.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Event sink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EventsConfig {
    /// Append events as JSON lines to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonl_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty)
    #[serde(default = "default_format")]
    pub format: LogFormat,

    /// Directory for log files (optional, if None logs only to stderr)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Enable stderr logging
    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    /// Log rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_format() -> LogFormat {
    LogFormat::Pretty
}

const fn default_true() -> bool {
    true
}
