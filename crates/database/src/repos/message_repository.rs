//! Repository for the append-only chat message log.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, info};

use crate::entities::ChatMessage;
use crate::types::{DatabaseError, DatabaseResult};

// `created_at` is the later of the current time and the newest stored
// timestamp, so insertion order never runs backwards even if the clock does.
const INSERT_MESSAGE: &str = r#"
    INSERT INTO messages (content, content_folded, author_name, created_at)
    VALUES (
        ?,
        ?,
        ?,
        MAX(
            strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
            COALESCE((SELECT MAX(created_at) FROM messages), '')
        )
    )
    RETURNING id, content, author_name, created_at
"#;

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message. The returned record carries the store-assigned id and timestamp.
    pub async fn create(&self, content: &str, author_name: &str) -> DatabaseResult<ChatMessage> {
        let row = sqlx::query(INSERT_MESSAGE)
            .bind(content)
            .bind(content.to_lowercase())
            .bind(author_name)
            .fetch_one(&self.pool)
            .await?;

        let message = message_from_row(&row)?;

        info!(
            message_id = message.id,
            author = %message.author_name,
            "created new message"
        );

        Ok(message)
    }

    /// Most recent messages first.
    pub async fn list_recent(&self, limit: i64) -> DatabaseResult<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, content, author_name, created_at FROM messages ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    /// Case-insensitive substring search, most recent first.
    ///
    /// Both sides are folded with Unicode lowercasing, so `"über"` matches `"Über"`.
    pub async fn search(&self, query: &str, limit: i64) -> DatabaseResult<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, content, author_name, created_at FROM messages
             WHERE instr(content_folded, ?) > 0
             ORDER BY id DESC LIMIT ?",
        )
        .bind(query.to_lowercase())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(query, matches = rows.len(), "searched messages");

        rows.iter().map(message_from_row).collect()
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn message_from_row(row: &SqliteRow) -> DatabaseResult<ChatMessage> {
    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|_| DatabaseError::InvalidTimestamp(created_at.clone()))?
        .with_timezone(&Utc);

    Ok(ChatMessage {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        author_name: row.try_get("author_name")?,
        created_at,
    })
}
