//! In-memory registry of admitted connections.
//!
//! The registry is the authority on who is online. Every mutation happens
//! under a synchronous mutex that is never held across an await point;
//! broadcasts take a snapshot of the outbound handles and deliver without
//! blocking, so one slow receiver cannot hold up the rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chatline_auth::Identity;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

use crate::error::{DeliveryError, RealtimeError, RealtimeResult};
use crate::events::ServerEvent;

pub type ConnectionId = u64;

/// The caller's view of an admitted connection. The identity never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub identity: Identity,
}

#[derive(Debug)]
struct Connection {
    identity: Identity,
    sender: mpsc::Sender<ServerEvent>,
    connected_at: DateTime<Utc>,
    typing: bool,
}

#[derive(Debug, Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, Connection>,
    live_per_user: HashMap<i64, usize>,
}

/// Result of adding a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub id: ConnectionId,
    /// True when this is the identity's first live connection.
    pub came_online: bool,
}

/// Result of removing a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub identity: Identity,
    /// True when this was the identity's last live connection.
    pub went_offline: bool,
    /// The last relayed typing signal from this connection was a start.
    pub was_typing: bool,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RealtimeResult<MutexGuard<'_, RegistryState>> {
        self.state.lock().map_err(|_| {
            error!("connection registry lock poisoned");
            RealtimeError::Registry("registry lock poisoned".to_string())
        })
    }

    pub fn register(
        &self,
        identity: Identity,
        sender: mpsc::Sender<ServerEvent>,
    ) -> RealtimeResult<Registration> {
        let mut state = self.lock()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let user_id = identity.user_id;

        state.connections.insert(
            id,
            Connection {
                identity,
                sender,
                connected_at: Utc::now(),
                typing: false,
            },
        );

        let live = state.live_per_user.entry(user_id).or_insert(0);
        *live += 1;
        let came_online = *live == 1;

        debug!(connection_id = id, user_id, live = *live, "connection registered");
        Ok(Registration { id, came_online })
    }

    /// Remove a connection. Returns `None` when it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> RealtimeResult<Option<Removal>> {
        let mut state = self.lock()?;

        let Some(connection) = state.connections.remove(&id) else {
            return Ok(None);
        };

        let user_id = connection.identity.user_id;
        let went_offline = match state.live_per_user.get_mut(&user_id) {
            Some(live) if *live > 1 => {
                *live -= 1;
                false
            }
            _ => {
                state.live_per_user.remove(&user_id);
                true
            }
        };

        debug!(connection_id = id, user_id, went_offline, "connection unregistered");
        Ok(Some(Removal {
            identity: connection.identity,
            went_offline,
            was_typing: connection.typing,
            connected_at: connection.connected_at,
        }))
    }

    /// Record the latest typing signal relayed for a connection.
    pub fn set_typing(&self, id: ConnectionId, typing: bool) -> RealtimeResult<()> {
        let mut state = self.lock()?;
        if let Some(connection) = state.connections.get_mut(&id) {
            connection.typing = typing;
        }
        Ok(())
    }

    /// Deliver `event` to every registered connection except `except`.
    ///
    /// Returns the number of connections the event was queued for. Failed
    /// recipients are logged and skipped.
    pub fn broadcast(&self, event: &ServerEvent, except: Option<ConnectionId>) -> RealtimeResult<usize> {
        let recipients: Vec<(ConnectionId, mpsc::Sender<ServerEvent>)> = {
            let state = self.lock()?;
            state
                .connections
                .iter()
                .filter(|(id, _)| Some(**id) != except)
                .map(|(id, connection)| (*id, connection.sender.clone()))
                .collect()
        };

        let mut delivered = 0;
        for (id, sender) in recipients {
            match deliver(id, &sender, event.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(error = %err, event = event.name(), "broadcast delivery failed"),
            }
        }

        Ok(delivered)
    }

    /// Queue an event for a single connection.
    pub fn send_to(&self, id: ConnectionId, event: ServerEvent) -> RealtimeResult<bool> {
        let sender = {
            let state = self.lock()?;
            match state.connections.get(&id) {
                Some(connection) => connection.sender.clone(),
                None => return Ok(false),
            }
        };

        match deliver(id, &sender, event) {
            Ok(()) => Ok(true),
            Err(err) => {
                warn!(error = %err, "direct delivery failed");
                Ok(false)
            }
        }
    }

    /// Ids of users with at least one live connection, ascending.
    pub fn online_users(&self) -> RealtimeResult<Vec<i64>> {
        let state = self.lock()?;
        let mut users: Vec<i64> = state.live_per_user.keys().copied().collect();
        users.sort_unstable();
        Ok(users)
    }

    pub fn is_online(&self, user_id: i64) -> RealtimeResult<bool> {
        Ok(self.lock()?.live_per_user.contains_key(&user_id))
    }

    pub fn connection_count(&self) -> RealtimeResult<usize> {
        Ok(self.lock()?.connections.len())
    }

    /// Drop every connection. Their outbound senders close, which ends the
    /// writer tasks draining them.
    pub fn clear(&self) -> RealtimeResult<usize> {
        let mut state = self.lock()?;
        let dropped = state.connections.len();
        state.connections.clear();
        state.live_per_user.clear();
        Ok(dropped)
    }
}

fn deliver(
    id: ConnectionId,
    sender: &mpsc::Sender<ServerEvent>,
    event: ServerEvent,
) -> Result<(), DeliveryError> {
    sender.try_send(event).map_err(|err| match err {
        TrySendError::Full(_) => DeliveryError::Full(id),
        TrySendError::Closed(_) => DeliveryError::Closed(id),
    })
}
