use crate::models::message::Message;
use crate::models::user::UserSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conversation row. Direct conversations only in current scope; the sorted
/// participant pair lives in the store, not on this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Membership row joined with the member's display name.
#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: Uuid,
    pub name: String,
    pub unread: bool,
}

impl Participant {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.user_id,
            name: self.name.clone(),
        }
    }
}

/// A conversation the requester belongs to, with their unread flag.
#[derive(Debug, Clone)]
pub struct MemberConversation {
    pub conversation: Conversation,
    pub unread: bool,
}

/// Conversation with its sanitized participant list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<UserSummary>,
}

/// Listing entry: the view plus the requester's unread flag and the most
/// recent message. `last_message` is None for conversations with no messages;
/// those sort after everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<UserSummary>,
    pub unread: bool,
    pub last_message: Option<Message>,
}
