//! SQLite implementation of the SessionStore.
//!
//! One row per run. The artifact is kept as a JSON text column so old rows
//! stay readable as the artifact grows fields.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::{RunArtifact, SessionStatus, SimulationSession};
use crate::domain::ports::SessionStore;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY NOT NULL,
    seed TEXT NOT NULL,
    status TEXT NOT NULL,
    artifact TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);
CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON sessions(created_at);
";

/// Pool size for file-backed stores.
const MAX_CONNECTIONS: u32 = 4;

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file at `path` and ensure the
    /// schema. A leading `sqlite:` scheme is accepted.
    pub async fn open(path: &str) -> SimulationResult<Self> {
        let file = session_db_file(path);
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SimulationError::DatabaseError(format!(
                    "cannot create {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(file)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. It lives on a single connection that is
    /// never recycled, so sessions survive as long as the store.
    pub async fn in_memory() -> SimulationResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> SimulationResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn session_db_file(path: &str) -> &Path {
    let file = path
        .strip_prefix("sqlite://")
        .or_else(|| path.strip_prefix("sqlite:"))
        .unwrap_or(path);
    Path::new(file.split('?').next().unwrap_or(file))
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, session: &SimulationSession) -> SimulationResult<()> {
        let artifact_json = session
            .artifact
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r"INSERT INTO sessions (id, seed, status, artifact, created_at, updated_at)
              VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(session.id.to_string())
        .bind(&session.seed)
        .bind(session.status.as_str())
        .bind(artifact_json)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> SimulationResult<Option<SimulationSession>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT id, seed, status, artifact, created_at, updated_at FROM sessions WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, session: &SimulationSession) -> SimulationResult<()> {
        let artifact_json = session
            .artifact
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "UPDATE sessions SET seed = ?, status = ?, artifact = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&session.seed)
        .bind(session.status.as_str())
        .bind(artifact_json)
        .bind(session.updated_at.to_rfc3339())
        .bind(session.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SimulationError::SessionNotFound(session.id));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> SimulationResult<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(SimulationError::SessionNotFound(id));
        }

        Ok(())
    }

    async fn list(
        &self,
        status: Option<SessionStatus>,
        limit: usize,
    ) -> SimulationResult<Vec<SimulationSession>> {
        let mut query = String::from(
            "SELECT id, seed, status, artifact, created_at, updated_at FROM sessions WHERE 1=1",
        );
        if status.is_some() {
            query.push_str(" AND status = ?");
        }
        query.push_str(" ORDER BY created_at DESC LIMIT ?");

        let mut q = sqlx::query_as::<_, SessionRow>(&query);
        if let Some(status) = status {
            q = q.bind(status.as_str());
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<SessionRow> = q.bind(limit).fetch_all(&self.pool).await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    seed: String,
    status: String,
    artifact: Option<String>,
    created_at: String,
    updated_at: String,
}

fn parse_datetime(s: &str) -> SimulationResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SimulationError::SerializationError(e.to_string()))
}

impl TryFrom<SessionRow> for SimulationSession {
    type Error = SimulationError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| SimulationError::SerializationError(e.to_string()))?;

        let status = SessionStatus::parse_str(&row.status).ok_or_else(|| {
            SimulationError::SerializationError(format!("Invalid status: {}", row.status))
        })?;

        let artifact = row
            .artifact
            .map(|json| RunArtifact::from_json(&json))
            .transpose()?;

        Ok(Self {
            id,
            seed: row.seed,
            status,
            artifact,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
