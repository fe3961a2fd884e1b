use thiserror::Error;

use crate::registry::ConnectionId;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("missing credential")]
    MissingCredential,
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("message content must not be empty")]
    EmptyContent,
    #[error("message content exceeds {max} characters")]
    ContentTooLong { max: usize },
    #[error("search query must not be empty")]
    EmptyQuery,
    #[error("failed to persist message: {0}")]
    Persistence(String),
    #[error("message store unavailable: {0}")]
    Storage(String),
    #[error("connection registry unavailable: {0}")]
    Registry(String),
}

impl RealtimeError {
    /// Stable code sent to clients in `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            RealtimeError::MissingCredential => "missing_credential",
            RealtimeError::InvalidCredential(_) => "invalid_credential",
            RealtimeError::EmptyContent => "empty_content",
            RealtimeError::ContentTooLong { .. } => "content_too_long",
            RealtimeError::EmptyQuery => "empty_query",
            RealtimeError::Persistence(_) => "persistence_failed",
            RealtimeError::Storage(_) => "store_unavailable",
            RealtimeError::Registry(_) => "registry_unavailable",
        }
    }
}

/// A single recipient could not be reached during a broadcast.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound queue of connection {0} is full")]
    Full(ConnectionId),
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
