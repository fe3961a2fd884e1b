//! Realtime fan-out and presence coordination for Chatline.
//!
//! Connections are admitted with a verified credential, tracked in a
//! [`ConnectionRegistry`], and fed events through bounded per-connection
//! queues. Chat messages are persisted before they are broadcast; typing
//! and presence signals are relayed without persistence.

pub mod admission;
pub mod error;
pub mod events;
pub mod fanout;
pub mod hub;
pub mod presence;
pub mod registry;
pub mod store;

pub use admission::{admit, CredentialVerifier};
pub use error::{DeliveryError, RealtimeError, RealtimeResult};
pub use events::{ClientEvent, PresenceStatus, ServerEvent};
pub use fanout::MessageFanOut;
pub use hub::ChatHub;
pub use presence::PresenceBroadcaster;
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, Registration, Removal};
pub use store::{MessageStore, StoreError};
