//! Wiring from configuration to a ready-to-run controller.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::agent::HttpAgentClient;
use crate::adapters::events::{FanoutEventSink, JsonlEventSink, TracingEventSink};
use crate::adapters::oracle::AnthropicOracle;
use crate::adapters::scripted::{ScriptedAgent, ScriptedOracle};
use crate::adapters::store::{InMemorySessionStore, SqliteSessionStore};
use crate::domain::models::Config;
use crate::domain::ports::{AgentUnderTest, Oracle, SessionStore};
use crate::infrastructure::config::ConfigLoader;
use crate::services::SimulationController;

/// Load from `path` when given, otherwise from `.mimic/` and the environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

pub async fn open_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    let store = SqliteSessionStore::open(&config.store.database_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open session store at {}",
                config.store.database_path
            )
        })?;
    Ok(Arc::new(store))
}

/// A controller plus the background tasks it feeds.
pub struct SimulationRuntime {
    pub controller: Arc<SimulationController>,
    event_writer: Option<JoinHandle<()>>,
}

impl SimulationRuntime {
    /// Build the controller. `dry_run` swaps the network oracle and agent
    /// for scripted doubles and keeps sessions in memory.
    pub async fn build(config: Config, dry_run: bool) -> Result<Self> {
        ConfigLoader::validate(&config)?;

        let oracle: Arc<dyn Oracle>;
        let agent: Arc<dyn AgentUnderTest>;
        let store: Arc<dyn SessionStore>;
        if dry_run {
            info!("dry run: using scripted oracle and agent");
            oracle = Arc::new(ScriptedOracle::new());
            agent = Arc::new(ScriptedAgent::suv_dealer());
            store = Arc::new(InMemorySessionStore::new());
        } else {
            oracle = Arc::new(
                AnthropicOracle::new(&config.oracle).context("Failed to create oracle client")?,
            );
            agent = Arc::new(
                HttpAgentClient::from_config(&config.agent)
                    .context("Failed to create agent client")?,
            );
            store = open_store(&config).await?;
        }

        let mut events = FanoutEventSink::new().with(Arc::new(TracingEventSink));
        let mut event_writer = None;
        if let Some(path) = &config.events.jsonl_path {
            let (sink, handle) = JsonlEventSink::spawn(path);
            events = events.with(Arc::new(sink));
            event_writer = Some(handle);
        }

        let controller = SimulationController::builder()
            .oracle(oracle)
            .agent(agent)
            .session_store(store)
            .event_sink(Arc::new(events))
            .config(config)
            .build()?;

        Ok(Self {
            controller: Arc::new(controller),
            event_writer,
        })
    }

    /// Drop the controller and wait for queued events to reach disk.
    pub async fn shutdown(self) {
        drop(self.controller);
        if let Some(handle) = self.event_writer {
            if let Err(e) = handle.await {
                warn!(error = %e, "event writer task failed");
            }
        }
    }
}
