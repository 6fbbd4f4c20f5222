//! Event sink adapters.
//!
//! All sinks are fire-and-forget. The JSONL sink hands events to a writer
//! task over an unbounded channel so `log` never blocks the turn loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::ports::EventSink;

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn log(&self, _event_type: &str, _payload: Value) {}
}

/// Emits each event as an `info` record on the `mimic::events` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn log(&self, event_type: &str, payload: Value) {
        info!(target: "mimic::events", event_type, %payload, "event");
    }
}

/// Appends `{"ts", "event_type", "payload"}` lines to a file.
pub struct JsonlEventSink {
    tx: mpsc::UnboundedSender<String>,
    path: PathBuf,
}

impl JsonlEventSink {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    ///
    /// The returned handle completes once every sender is dropped and the
    /// queue is flushed.
    pub fn spawn(path: impl Into<PathBuf>) -> (Self, JoinHandle<()>) {
        let path = path.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_lines(path.clone(), rx));
        (Self { tx, path }, handle)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn write_lines(path: PathBuf, mut rx: mpsc::UnboundedReceiver<String>) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %path.display(), error = %e, "cannot create event log directory");
        }
    }
    let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot open event log, events dropped");
            while rx.recv().await.is_some() {}
            return;
        }
    };

    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!(error = %e, "failed to write event");
        }
    }
    if let Err(e) = file.flush().await {
        warn!(error = %e, "failed to flush event log");
    }
}

impl EventSink for JsonlEventSink {
    fn log(&self, event_type: &str, payload: Value) {
        let line = json!({
            "ts": Utc::now().to_rfc3339(),
            "event_type": event_type,
            "payload": payload,
        })
        .to_string();
        if self.tx.send(line).is_err() {
            warn!(event_type, "event writer closed, event dropped");
        }
    }
}

/// Forwards every event to each inner sink.
#[derive(Default, Clone)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutEventSink {
    fn log(&self, event_type: &str, payload: Value) {
        for sink in &self.sinks {
            sink.log(event_type, payload.clone());
        }
    }
}

/// Collects events in memory. Handy for asserting on emitted events.
#[derive(Default)]
pub struct RecordingEventSink {
    events: std::sync::Mutex<Vec<(String, Value)>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|(t, _)| t).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn log(&self, event_type: &str, payload: Value) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((event_type.to_string(), payload));
    }
}
