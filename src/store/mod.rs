//! Store interfaces for the messaging domain.
//!
//! Relationship traversal is always an explicit query (`find_participants`,
//! `last_message`) returning plain records; nothing is lazily loaded. The
//! Postgres adapter is the production backend; the in-memory adapter backs
//! tests and local runs without infrastructure.

use crate::error::AppResult;
use crate::models::{Conversation, MemberConversation, Message, Participant, UserSummary};
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Read model over users. Canonical account data lives with the identity
/// provider; only sanitized fields come out of here.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<UserSummary>>;

    /// Everyone except the requester, ordered by id.
    async fn list_other_users(&self, requester: Uuid) -> AppResult<Vec<UserSummary>>;
}

/// Inputs for creating a direct conversation.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub name: String,
    pub initiator: Uuid,
    pub receiver: Uuid,
    pub seed_content: String,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<Conversation>>;

    /// The direct conversation between this unordered pair, if one exists.
    async fn find_direct_between(&self, a: Uuid, b: Uuid) -> AppResult<Option<Conversation>>;

    /// Creates the conversation, both memberships (`unread = false`) and the
    /// seed message in one transaction. Fails with `AppError::Conflict` when
    /// a concurrent create for the same pair won; callers re-fetch instead
    /// of surfacing that.
    async fn create_direct(&self, new: NewConversation) -> AppResult<(Conversation, Message)>;

    /// Membership rows with display names, ordered by user id.
    async fn find_participants(&self, conversation_id: Uuid) -> AppResult<Vec<Participant>>;

    /// All conversations the user belongs to, with their unread flag.
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<MemberConversation>>;

    /// Clears the user's unread flag for one conversation.
    async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message and flags `unread` for every participant except the
    /// sender, atomically. A reader never sees one without the other.
    async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Message>;

    /// All messages oldest to newest ((created_at, id) order).
    async fn list(&self, conversation_id: Uuid) -> AppResult<Vec<Message>>;

    async fn last_message(&self, conversation_id: Uuid) -> AppResult<Option<Message>>;
}

/// The unordered pair as stored: (low, high) by uuid order.
pub fn sorted_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_pair_is_order_insensitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(sorted_pair(a, b), sorted_pair(b, a));
        let (low, high) = sorted_pair(a, b);
        assert!(low < high);
    }
}
