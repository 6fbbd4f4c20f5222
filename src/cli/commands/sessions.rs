//! `mimic sessions`: inspect stored runs.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::display::{action_success, list_table, output, render_list, truncate, CommandOutput};
use crate::cli::runtime::open_store;
use crate::cli::types::SessionCommands;
use crate::domain::models::{Config, SessionStatus, SimulationSession};

#[derive(Debug, Serialize)]
pub struct SessionRow {
    pub id: Uuid,
    pub seed: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub steps_used: u32,
    pub created_at: String,
}

impl From<&SimulationSession> for SessionRow {
    fn from(session: &SimulationSession) -> Self {
        Self {
            id: session.id,
            seed: session.seed.clone(),
            status: session.status,
            stop_reason: session
                .artifact
                .as_ref()
                .map(|a| a.stop_reason.to_string()),
            steps_used: session.artifact.as_ref().map_or(0, |a| a.steps_used),
            created_at: session.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListOutput {
    pub sessions: Vec<SessionRow>,
    pub total: usize,
}

impl CommandOutput for SessionListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "status", "stop", "steps", "seed", "created"]);
        for s in &self.sessions {
            table.add_row(vec![
                s.id.to_string()[..8].to_string(),
                s.status.to_string(),
                s.stop_reason.clone().unwrap_or_else(|| "-".to_string()),
                s.steps_used.to_string(),
                truncate(&s.seed, 36),
                s.created_at.clone(),
            ]);
        }
        render_list("session", &table, self.total)
    }
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct SessionDetailOutput {
    pub session: SimulationSession,
}

impl CommandOutput for SessionDetailOutput {
    fn to_human(&self) -> String {
        let s = &self.session;
        let mut lines = vec![
            format!("Session {}", s.id),
            format!("  status:   {}", s.status),
            format!("  seed:     {}", s.seed),
            format!("  created:  {}", s.created_at.to_rfc3339()),
            format!("  updated:  {}", s.updated_at.to_rfc3339()),
        ];
        match &s.artifact {
            Some(artifact) => {
                lines.push(format!(
                    "  stop:     {} after {} step(s)",
                    artifact.stop_reason, artifact.steps_used
                ));
                for turn in &artifact.turns {
                    lines.push(format!(
                        "  [{}] user:  {}",
                        turn.step,
                        truncate(&turn.user_text, 80)
                    ));
                    lines.push(format!("      agent: {}", truncate(&turn.assistant_text, 80)));
                }
            }
            None => lines.push("  (run still in progress or interrupted)".to_string()),
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteOutput {
    pub id: Uuid,
    pub deleted: bool,
}

impl CommandOutput for DeleteOutput {
    fn to_human(&self) -> String {
        action_success(&format!("Deleted session {}", self.id))
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).with_context(|| format!("Invalid session ID: {id}"))
}

pub async fn execute(command: SessionCommands, config: Config, json_mode: bool) -> Result<()> {
    let store = open_store(&config).await?;

    match command {
        SessionCommands::List { status, limit } => {
            let status = status
                .map(|s| SessionStatus::parse_str(&s).ok_or_else(|| anyhow!("Invalid status: {s}")))
                .transpose()?;
            let sessions = store.list(status, limit).await?;
            let rows: Vec<SessionRow> = sessions.iter().map(SessionRow::from).collect();
            let total = rows.len();
            output(&SessionListOutput { sessions: rows, total }, json_mode);
        }
        SessionCommands::Show { id } => {
            let id = parse_id(&id)?;
            let session = store
                .get(id)
                .await?
                .ok_or_else(|| anyhow!("Session not found: {id}"))?;
            output(&SessionDetailOutput { session }, json_mode);
        }
        SessionCommands::Delete { id } => {
            let id = parse_id(&id)?;
            store.delete(id).await?;
            output(&DeleteOutput { id, deleted: true }, json_mode);
        }
    }

    Ok(())
}
