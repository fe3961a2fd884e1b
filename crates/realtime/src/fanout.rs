use std::sync::Arc;

use chatline_auth::Identity;
use chatline_database::ChatMessage;
use tracing::{error, info};

use crate::error::{RealtimeError, RealtimeResult};
use crate::events::ServerEvent;
use crate::registry::ConnectionRegistry;
use crate::store::MessageStore;

/// Validate, persist, then broadcast a chat message.
#[derive(Clone)]
pub struct MessageFanOut {
    store: Arc<dyn MessageStore>,
    registry: Arc<ConnectionRegistry>,
    max_length: usize,
}

impl MessageFanOut {
    pub fn new(
        store: Arc<dyn MessageStore>,
        registry: Arc<ConnectionRegistry>,
        max_length: usize,
    ) -> Self {
        Self {
            store,
            registry,
            max_length,
        }
    }

    /// Shared by the socket and REST paths. The persisted record goes to every
    /// registered connection, the sender's included, and is returned.
    pub async fn send_message(&self, content: &str, sender: &Identity) -> RealtimeResult<ChatMessage> {
        if content.trim().is_empty() {
            return Err(RealtimeError::EmptyContent);
        }
        if content.chars().count() > self.max_length {
            return Err(RealtimeError::ContentTooLong {
                max: self.max_length,
            });
        }

        let author_name = sender.display_name();
        let message = self
            .store
            .create(content, author_name)
            .await
            .map_err(|err| {
                error!(user_id = sender.user_id, error = %err, "failed to persist message");
                RealtimeError::Persistence(err.to_string())
            })?;

        info!(
            message_id = message.id,
            user_id = sender.user_id,
            "message persisted"
        );

        // A registry failure here must not turn a persisted message into an error.
        if let Ok(delivered) = self
            .registry
            .broadcast(&ServerEvent::NewMessage(message.clone()), None)
        {
            info!(message_id = message.id, delivered, "message broadcast");
        }

        Ok(message)
    }
}
