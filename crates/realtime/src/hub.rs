use std::sync::Arc;

use chatline_auth::Identity;
use chatline_config::RealtimeConfig;
use chatline_database::ChatMessage;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{RealtimeError, RealtimeResult};
use crate::events::{ClientEvent, ServerEvent};
use crate::fanout::MessageFanOut;
use crate::presence::PresenceBroadcaster;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::store::MessageStore;

/// Owns the connection registry and routes client events to the fan-out
/// engine and the presence broadcaster.
pub struct ChatHub {
    registry: Arc<ConnectionRegistry>,
    presence: PresenceBroadcaster,
    fanout: MessageFanOut,
    store: Arc<dyn MessageStore>,
    outbound_buffer: usize,
    history_limit: i64,
}

impl ChatHub {
    pub fn new(store: Arc<dyn MessageStore>, config: &RealtimeConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());

        Self {
            presence: PresenceBroadcaster::new(registry.clone()),
            fanout: MessageFanOut::new(store.clone(), registry.clone(), config.max_message_length),
            registry,
            store,
            outbound_buffer: config.outbound_buffer.max(1),
            history_limit: config.history_limit.max(1),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Register an admitted identity. The returned receiver yields `ready`
    /// first, then every event broadcast to this connection.
    pub fn connect(
        &self,
        identity: Identity,
    ) -> RealtimeResult<(ConnectionHandle, mpsc::Receiver<ServerEvent>)> {
        let (sender, receiver) = mpsc::channel(self.outbound_buffer);

        let mut online = self.registry.online_users()?;
        if let Err(pos) = online.binary_search(&identity.user_id) {
            online.insert(pos, identity.user_id);
        }
        let ready = ServerEvent::Ready {
            user_id: identity.user_id,
            online,
        };
        // The channel is fresh and has capacity for at least one event.
        let _ = sender.try_send(ready);

        let registration = self.registry.register(identity.clone(), sender)?;
        let handle = ConnectionHandle {
            id: registration.id,
            identity,
        };

        info!(
            connection_id = handle.id,
            user_id = handle.identity.user_id,
            "connection registered"
        );

        if registration.came_online {
            self.presence.announce_online(handle.identity.user_id)?;
        }

        Ok((handle, receiver))
    }

    /// Handle one inbound event. Failures are also reported to the
    /// originating connection as an `error` event.
    pub async fn dispatch(&self, handle: &ConnectionHandle, event: ClientEvent) -> RealtimeResult<()> {
        let result = match event {
            ClientEvent::SendMessage { content } => self
                .fanout
                .send_message(&content, &handle.identity)
                .await
                .map(|_| ()),
            ClientEvent::Typing => self.presence.typing(handle.id, &handle.identity).map(|_| ()),
            ClientEvent::StopTyping => self
                .presence
                .stop_typing(handle.id, &handle.identity)
                .map(|_| ()),
        };

        if let Err(err) = &result {
            self.notify(handle, ServerEvent::error(err.code(), err.to_string()));
        }

        result
    }

    /// Answer a frame that could not be decoded. The connection stays open.
    pub fn reject_frame(&self, handle: &ConnectionHandle, detail: &str) {
        warn!(
            connection_id = handle.id,
            user_id = handle.identity.user_id,
            detail,
            "invalid client frame"
        );
        self.notify(handle, ServerEvent::error("invalid_event", detail));
    }

    fn notify(&self, handle: &ConnectionHandle, event: ServerEvent) {
        if let Err(err) = self.registry.send_to(handle.id, event) {
            warn!(connection_id = handle.id, error = %err, "could not notify connection");
        }
    }

    /// Send on behalf of `sender` from outside a socket.
    pub async fn send_message(&self, content: &str, sender: &Identity) -> RealtimeResult<ChatMessage> {
        self.fanout.send_message(content, sender).await
    }

    /// Remove a connection after its transport closed.
    pub fn disconnect(&self, handle: &ConnectionHandle) -> RealtimeResult<()> {
        let Some(removal) = self.registry.unregister(handle.id)? else {
            return Ok(());
        };

        let user_id = removal.identity.user_id;
        if removal.was_typing {
            self.presence.broadcast_stop_typing(user_id, None)?;
        }
        if removal.went_offline {
            self.presence.announce_offline(user_id)?;
        }

        let connected_for = Utc::now() - removal.connected_at;
        info!(
            connection_id = handle.id,
            user_id,
            connected_secs = connected_for.num_seconds(),
            "connection closed"
        );
        Ok(())
    }

    pub async fn recent_messages(&self, limit: Option<i64>) -> RealtimeResult<Vec<ChatMessage>> {
        self.store
            .list_recent(self.clamp_limit(limit))
            .await
            .map_err(|err| RealtimeError::Storage(err.to_string()))
    }

    pub async fn search_messages(
        &self,
        query: &str,
        limit: Option<i64>,
    ) -> RealtimeResult<Vec<ChatMessage>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RealtimeError::EmptyQuery);
        }

        self.store
            .search(query, self.clamp_limit(limit))
            .await
            .map_err(|err| RealtimeError::Storage(err.to_string()))
    }

    pub fn online_users(&self) -> RealtimeResult<Vec<i64>> {
        self.registry.online_users()
    }

    /// Drop every connection; their writer tasks end once the queues drain.
    pub fn shutdown(&self) -> RealtimeResult<usize> {
        let dropped = self.registry.clear()?;
        info!(dropped, "realtime hub shut down");
        Ok(dropped)
    }

    fn clamp_limit(&self, limit: Option<i64>) -> i64 {
        limit.unwrap_or(self.history_limit).clamp(1, self.history_limit)
    }
}
