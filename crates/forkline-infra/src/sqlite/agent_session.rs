//! SQLite agent session store.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use forkline_core::agent::session_store::AgentSessionStore;
use forkline_types::agent::{AgentSession, SessionEvent, SessionState};
use forkline_types::error::RepositoryError;
use forkline_types::llm::MessageRole;

use super::pool::DatabasePool;

#[derive(Clone)]
pub struct SqliteAgentSessionStore {
    pool: DatabasePool,
}

impl SqliteAgentSessionStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct SessionRow {
    id: String,
    app_name: String,
    user_id: String,
    state: String,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            app_name: row.try_get("app_name")?,
            user_id: row.try_get("user_id")?,
            state: row.try_get("state")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_session(self) -> Result<AgentSession, RepositoryError> {
        let state: SessionState = serde_json::from_str(&self.state)
            .map_err(|e| RepositoryError::Query(format!("invalid session state: {e}")))?;

        Ok(AgentSession {
            id: self.id,
            app_name: self.app_name,
            user_id: self.user_id,
            state,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct EventRow {
    id: i64,
    session_id: String,
    author: String,
    role: String,
    content: String,
    created_at: String,
}

impl EventRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            author: row.try_get("author")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_event(self) -> Result<SessionEvent, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(SessionEvent {
            id: self.id,
            session_id: self.session_id,
            author: self.author,
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

impl AgentSessionStore for SqliteAgentSessionStore {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        state: SessionState,
    ) -> Result<AgentSession, RepositoryError> {
        let now = Utc::now();
        let session = AgentSession {
            id: Uuid::now_v7().to_string(),
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            state,
            created_at: now,
            updated_at: now,
        };
        let state_json = serde_json::to_string(&session.state)
            .map_err(|e| RepositoryError::Query(format!("failed to encode session state: {e}")))?;

        sqlx::query(
            r#"INSERT INTO agent_sessions (id, app_name, user_id, state, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&session.id)
        .bind(&session.app_name)
        .bind(&session.user_id)
        .bind(state_json)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<AgentSession>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM agent_sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row =
                    SessionRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn append_event(
        &self,
        session_id: &str,
        author: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<SessionEvent, RepositoryError> {
        let created_at = Utc::now();
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            r#"INSERT INTO agent_session_events (session_id, author, role, content, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(session_id)
        .bind(author)
        .bind(role.to_string())
        .bind(content)
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.message().contains("FOREIGN KEY") => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Query(other.to_string()),
        })?;

        sqlx::query("UPDATE agent_sessions SET updated_at = ? WHERE id = ?")
            .bind(created_at.to_rfc3339())
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(SessionEvent {
            id: result.last_insert_rowid(),
            session_id: session_id.to_string(),
            author: author.to_string(),
            role,
            content: content.to_string(),
            created_at,
        })
    }

    async fn list_events(&self, session_id: &str) -> Result<Vec<SessionEvent>, RepositoryError> {
        let rows =
            sqlx::query("SELECT * FROM agent_session_events WHERE session_id = ? ORDER BY id ASC")
                .bind(session_id)
                .fetch_all(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            let event_row =
                EventRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            events.push(event_row.into_event()?);
        }
        Ok(events)
    }
}
