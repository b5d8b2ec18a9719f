//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `forkline-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reads on the reader
//! pool and writes on the single-connection writer.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use forkline_core::chat::repository::ChatRepository;
use forkline_types::chat::{
    Chat, ChatDetail, ChatId, ChatMessage, ChatType, ForkOutcome, MessageId, MessageRole,
    NewChat, NewFork,
};
use forkline_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRepository`.
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn load_detail(&self, chat_id: ChatId) -> Result<ChatDetail, RepositoryError> {
        let chat = self.get_chat(chat_id).await?.ok_or(RepositoryError::NotFound)?;
        let messages = self.get_messages(chat_id).await?;
        Ok(ChatDetail { chat, messages })
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatRow {
    id: i64,
    chat_type: String,
    parent_chat_id: Option<i64>,
    parent_message_id: Option<i64>,
    agent_session_id: Option<String>,
    title: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_type: row.try_get("type")?,
            parent_chat_id: row.try_get("parent_chat_id")?,
            parent_message_id: row.try_get("parent_message_id")?,
            agent_session_id: row.try_get("agent_session_id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_chat(self) -> Result<Chat, RepositoryError> {
        let chat_type: ChatType = self
            .chat_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Chat {
            id: self.id,
            chat_type,
            parent_chat_id: self.parent_chat_id,
            parent_message_id: self.parent_message_id,
            // Legacy rows store '' for "no session yet".
            agent_session_id: self.agent_session_id.filter(|s| !s.is_empty()),
            title: self.title,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: i64,
    chat_id: i64,
    role: String,
    content: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let role: MessageRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            id: self.id,
            chat_id: self.chat_id,
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE"))
}

fn map_chat_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Chat>, RepositoryError> {
    let mut chats = Vec::with_capacity(rows.len());
    for row in rows {
        let chat_row = ChatRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        chats.push(chat_row.into_chat()?);
    }
    Ok(chats)
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn create_chat(&self, chat: &NewChat) -> Result<Chat, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let result = sqlx::query(
            r#"INSERT INTO chats (type, parent_chat_id, parent_message_id, agent_session_id, title, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(chat.chat_type.as_str())
        .bind(chat.parent_chat_id)
        .bind(chat.parent_message_id)
        .bind(&chat.agent_session_id)
        .bind(&chat.title)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                return Err(RepositoryError::Conflict(format!(
                    "message {:?} already has a secondary chat",
                    chat.parent_message_id
                )));
            }
            Err(e) => return Err(RepositoryError::Query(e.to_string())),
        };

        self.get_chat(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn get_chat(&self, chat_id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let chat_row =
                    ChatRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(chat_row.into_chat()?))
            }
            None => Ok(None),
        }
    }

    async fn list_chats(&self, chat_type: ChatType) -> Result<Vec<Chat>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM chats WHERE type = ? ORDER BY id DESC")
            .bind(chat_type.as_str())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_chat_rows(&rows)
    }

    async fn get_messages(&self, chat_id: ChatId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM messages WHERE chat_id = ? ORDER BY id ASC")
            .bind(chat_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(msg_row.into_message()?);
        }

        Ok(messages)
    }

    async fn get_message_in_chat(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ? AND chat_id = ?")
            .bind(message_id)
            .bind(chat_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let msg_row =
                    MessageRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(msg_row.into_message()?))
            }
            None => Ok(None),
        }
    }

    async fn find_fork(&self, parent_message_id: MessageId) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chats WHERE parent_message_id = ?")
            .bind(parent_message_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let chat_row =
                    ChatRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(chat_row.into_chat()?))
            }
            None => Ok(None),
        }
    }

    async fn save_message(
        &self,
        chat_id: ChatId,
        role: MessageRole,
        content: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO messages (chat_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(role.to_string())
        .bind(content)
        .bind(format_datetime(&created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(ChatMessage {
            id: result.last_insert_rowid(),
            chat_id,
            role,
            content: content.to_string(),
            created_at,
        })
    }

    async fn touch_chat(&self, chat_id: ChatId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(chat_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn set_agent_session_if_absent(
        &self,
        chat_id: ChatId,
        session_id: &str,
    ) -> Result<String, RepositoryError> {
        sqlx::query(
            r#"UPDATE chats SET agent_session_id = ?
               WHERE id = ? AND (agent_session_id IS NULL OR agent_session_id = '')"#,
        )
        .bind(session_id)
        .bind(chat_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Read back on the writer so the answer reflects the update above.
        let stored: Option<Option<String>> =
            sqlx::query_scalar("SELECT agent_session_id FROM chats WHERE id = ?")
                .bind(chat_id)
                .fetch_optional(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match stored {
            Some(Some(stored)) if !stored.is_empty() => Ok(stored),
            Some(_) => Err(RepositoryError::Query(format!(
                "chat {chat_id} still has no agent session after update"
            ))),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn create_fork(&self, fork: &NewFork) -> Result<ForkOutcome, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let inserted = sqlx::query(
            r#"INSERT INTO chats (type, parent_chat_id, parent_message_id, agent_session_id, title, created_at, updated_at)
               VALUES ('secondary', ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(fork.parent_chat_id)
        .bind(fork.parent_message_id)
        .bind(&fork.agent_session_id)
        .bind(&fork.title)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await;

        let chat_id = match inserted {
            Ok(done) => done.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                tx.rollback()
                    .await
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                debug!(
                    parent_message_id = fork.parent_message_id,
                    "Fork already exists; loading the existing chat"
                );
                let existing = self.find_fork(fork.parent_message_id).await?.ok_or_else(|| {
                    RepositoryError::Conflict(format!(
                        "message {} is forked but the fork is not visible",
                        fork.parent_message_id
                    ))
                })?;
                return Ok(ForkOutcome::Existing(self.load_detail(existing.id).await?));
            }
            Err(e) => return Err(RepositoryError::Query(e.to_string())),
        };

        for (role, content) in [
            (MessageRole::System, &fork.system_seed),
            (MessageRole::Assistant, &fork.assistant_seed),
        ] {
            sqlx::query(
                "INSERT INTO messages (chat_id, role, content, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(chat_id)
            .bind(role.to_string())
            .bind(content)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(ForkOutcome::Created(self.load_detail(chat_id).await?))
    }
}
