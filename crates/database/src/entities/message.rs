//! Message entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat message. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub content: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}
