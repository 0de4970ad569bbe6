use crate::models::user::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message row. Immutable once written; total order within a conversation is
/// (created_at, id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Message as rendered in a conversation listing: sender resolved to a
/// sanitized user, timestamp in the fixed client display format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: UserSummary,
    pub content: String,
    pub created_at: String,
}

impl Message {
    pub fn into_view(self, sender_name: String) -> MessageView {
        MessageView {
            id: self.id,
            conversation_id: self.conversation_id,
            sender: UserSummary {
                id: self.sender_id,
                name: sender_name,
            },
            content: self.content,
            created_at: format_timestamp(self.created_at),
        }
    }
}

/// Zero-padded day/month/year 24h clock, e.g. "05/03/2024 07:08:09".
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%d/%m/%Y %H:%M:%S").to_string()
}
