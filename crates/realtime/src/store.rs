use async_trait::async_trait;
use chatline_database::{ChatMessage, DatabaseError, MessageRepository};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<DatabaseError> for StoreError {
    fn from(error: DatabaseError) -> Self {
        StoreError(error.to_string())
    }
}

/// Durable message log consumed by the fan-out engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message; the store assigns `id` and `created_at`.
    async fn create(&self, content: &str, author_name: &str) -> Result<ChatMessage, StoreError>;

    /// Most recent messages first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<ChatMessage>, StoreError>;

    /// Case-insensitive substring match, most recent first.
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<ChatMessage>, StoreError>;
}

#[async_trait]
impl MessageStore for MessageRepository {
    async fn create(&self, content: &str, author_name: &str) -> Result<ChatMessage, StoreError> {
        Ok(MessageRepository::create(self, content, author_name).await?)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(MessageRepository::list_recent(self, limit).await?)
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(MessageRepository::search(self, query, limit).await?)
    }
}
