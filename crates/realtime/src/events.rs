//! Wire events exchanged over the realtime socket.
//!
//! Frames are JSON objects of the form `{"event": <name>, "data": <payload>}`.

use chatline_database::ChatMessage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Events pushed from the server to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// First event on every admitted connection.
    #[serde(rename_all = "camelCase")]
    Ready { user_id: i64, online: Vec<i64> },
    NewMessage(ChatMessage),
    #[serde(rename_all = "camelCase")]
    UserStatus {
        user_id: i64,
        status: PresenceStatus,
    },
    #[serde(rename_all = "camelCase")]
    UserTyping { user_id: i64, username: String },
    #[serde(rename_all = "camelCase")]
    UserStopTyping { user_id: i64 },
    Error { code: String, message: String },
}

impl ServerEvent {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Ready { .. } => "ready",
            ServerEvent::NewMessage(_) => "newMessage",
            ServerEvent::UserStatus { .. } => "userStatus",
            ServerEvent::UserTyping { .. } => "userTyping",
            ServerEvent::UserStopTyping { .. } => "userStopTyping",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Events accepted from clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    SendMessage { content: String },
    Typing,
    StopTyping,
}
