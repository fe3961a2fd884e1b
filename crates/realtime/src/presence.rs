use std::sync::Arc;

use chatline_auth::Identity;
use tracing::info;

use crate::error::RealtimeResult;
use crate::events::{PresenceStatus, ServerEvent};
use crate::registry::{ConnectionId, ConnectionRegistry};

/// Relays presence edges and typing signals. Nothing here is persisted.
#[derive(Debug, Clone)]
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn announce_online(&self, user_id: i64) -> RealtimeResult<usize> {
        info!(user_id, "user online");
        self.registry.broadcast(
            &ServerEvent::UserStatus {
                user_id,
                status: PresenceStatus::Online,
            },
            None,
        )
    }

    pub fn announce_offline(&self, user_id: i64) -> RealtimeResult<usize> {
        info!(user_id, "user offline");
        self.registry.broadcast(
            &ServerEvent::UserStatus {
                user_id,
                status: PresenceStatus::Offline,
            },
            None,
        )
    }

    /// Relay a typing start to every connection but the sender's.
    pub fn typing(&self, connection: ConnectionId, identity: &Identity) -> RealtimeResult<usize> {
        self.registry.set_typing(connection, true)?;
        self.registry.broadcast(
            &ServerEvent::UserTyping {
                user_id: identity.user_id,
                username: identity.display_name().to_string(),
            },
            Some(connection),
        )
    }

    /// Relay a typing stop to every connection but the sender's.
    pub fn stop_typing(&self, connection: ConnectionId, identity: &Identity) -> RealtimeResult<usize> {
        self.registry.set_typing(connection, false)?;
        self.broadcast_stop_typing(identity.user_id, Some(connection))
    }

    pub(crate) fn broadcast_stop_typing(
        &self,
        user_id: i64,
        except: Option<ConnectionId>,
    ) -> RealtimeResult<usize> {
        self.registry
            .broadcast(&ServerEvent::UserStopTyping { user_id }, except)
    }
}
