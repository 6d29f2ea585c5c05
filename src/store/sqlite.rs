//! SQLite-backed conversation store.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::store::types::{self, Conversation, ConversationDraft, Message, Upserted};
use crate::store::{ConversationStore, StoreError, StoreFuture, StoreResult};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS conversations (
        conversation_id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        messages TEXT NOT NULL DEFAULT '[]',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_conversations_user
        ON conversations (user_id, updated_at DESC);";

/// Columns as read from a row; messages and timestamps are decoded outside
/// the connection thread.
struct Row {
    conversation_id: String,
    user_id: String,
    name: String,
    messages: String,
    created_at: i64,
    updated_at: i64,
}

impl Row {
    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            conversation_id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            messages: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn decode(self) -> StoreResult<Conversation> {
        let messages: Vec<Message> = serde_json::from_str(&self.messages)?;
        let created_at = timestamp(&self.conversation_id, self.created_at)?;
        let updated_at = timestamp(&self.conversation_id, self.updated_at)?;
        Ok(Conversation {
            conversation_id: self.conversation_id,
            user_id: self.user_id,
            name: self.name,
            messages,
            created_at,
            updated_at,
        })
    }
}

fn timestamp(id: &str, millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::Corrupt {
        id: id.to_string(),
        reason: format!("timestamp {millis} out of range"),
    })
}

const SELECT_COLUMNS: &str =
    "SELECT conversation_id, user_id, name, messages, created_at, updated_at FROM conversations";

/// Conversation store on a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref().to_path_buf()).await?;
        Self::init(conn).await
    }

    /// Private in-memory database, mostly for tests.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> StoreResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

impl ConversationStore for SqliteStore {
    fn list_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> StoreFuture<'a, StoreResult<Option<Vec<Conversation>>>> {
        Box::pin(async move {
            let user_id = user_id.to_string();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "{SELECT_COLUMNS}
                         WHERE user_id = ?1
                         ORDER BY updated_at DESC, conversation_id ASC"
                    ))?;
                    let rows = stmt
                        .query_map([&user_id], Row::from_sql)?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;

            if rows.is_empty() {
                return Ok(None);
            }
            let conversations = rows
                .into_iter()
                .map(Row::decode)
                .collect::<StoreResult<Vec<_>>>()?;
            Ok(Some(conversations))
        })
    }

    fn get<'a>(&'a self, conversation_id: &'a str) -> StoreFuture<'a, StoreResult<Option<Conversation>>> {
        Box::pin(async move {
            let id = conversation_id.to_string();
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!("{SELECT_COLUMNS} WHERE conversation_id = ?1"),
                            [&id],
                            Row::from_sql,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;
            row.map(Row::decode).transpose()
        })
    }

    fn upsert(&self, draft: ConversationDraft) -> StoreFuture<'_, StoreResult<Upserted>> {
        Box::pin(async move {
            let messages = serde_json::to_string(&draft.messages)?;
            let now = types::now();
            let now_ms = now.timestamp_millis();

            let id = draft.conversation_id.clone();
            let user_id = draft.user_id.clone();
            let name = draft.name.clone();
            let previous_created = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let previous: Option<i64> = tx
                        .query_row(
                            "SELECT created_at FROM conversations WHERE conversation_id = ?1",
                            [&id],
                            |row| row.get(0),
                        )
                        .optional()?;
                    tx.execute(
                        "INSERT INTO conversations
                             (conversation_id, user_id, name, messages, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                         ON CONFLICT(conversation_id) DO UPDATE SET
                             user_id = excluded.user_id,
                             name = excluded.name,
                             messages = excluded.messages,
                             updated_at = excluded.updated_at",
                        rusqlite::params![id, user_id, name, messages, now_ms],
                    )?;
                    tx.commit()?;
                    Ok(previous)
                })
                .await?;

            let created_at = match previous_created {
                Some(millis) => timestamp(&draft.conversation_id, millis)?,
                None => now,
            };

            Ok(Upserted {
                conversation: Conversation {
                    conversation_id: draft.conversation_id,
                    user_id: draft.user_id,
                    name: draft.name,
                    messages: draft.messages,
                    created_at,
                    updated_at: now,
                },
                created: previous_created.is_none(),
            })
        })
    }
}
