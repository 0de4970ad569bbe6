use crate::error::{AppError, AppResult};
use crate::models::{Conversation, MemberConversation, Message, Participant, UserSummary};
use crate::store::{sorted_pair, ConversationStore, MessageStore, NewConversation, UserStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

struct Membership {
    user_id: Uuid,
    unread: bool,
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<Uuid, String>,
    conversations: HashMap<Uuid, Conversation>,
    // sorted pair -> conversation id; enforces dedup-on-create like the
    // unique index does in Postgres
    pairs: HashMap<(Uuid, Uuid), Uuid>,
    members: HashMap<Uuid, Vec<Membership>>,
    // append order; equals (created_at, id) order because appends are
    // serialized under the write lock
    messages: HashMap<Uuid, Vec<Message>>,
}

/// In-memory store for tests and infrastructure-free local runs. All three
/// store interfaces over one lock, so multi-entity writes are atomic the
/// same way the Postgres transactions are.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, id: Uuid, name: &str) {
        let mut guard = self.inner.write().await;
        guard.users.insert(id, name.to_string());
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<UserSummary>> {
        let guard = self.inner.read().await;
        Ok(guard.users.get(&id).map(|name| UserSummary {
            id,
            name: name.clone(),
        }))
    }

    async fn list_other_users(&self, requester: Uuid) -> AppResult<Vec<UserSummary>> {
        let guard = self.inner.read().await;
        Ok(guard
            .users
            .iter()
            .filter(|(id, _)| **id != requester)
            .map(|(id, name)| UserSummary {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        let guard = self.inner.read().await;
        Ok(guard.conversations.get(&id).cloned())
    }

    async fn find_direct_between(&self, a: Uuid, b: Uuid) -> AppResult<Option<Conversation>> {
        let guard = self.inner.read().await;
        Ok(guard
            .pairs
            .get(&sorted_pair(a, b))
            .and_then(|id| guard.conversations.get(id))
            .cloned())
    }

    async fn create_direct(&self, new: NewConversation) -> AppResult<(Conversation, Message)> {
        let mut guard = self.inner.write().await;
        let pair = sorted_pair(new.initiator, new.receiver);
        if guard.pairs.contains_key(&pair) {
            return Err(AppError::Conflict);
        }

        let conversation = Conversation {
            id: Uuid::new_v4(),
            name: new.name,
            created_at: Utc::now(),
        };
        let seed = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            sender_id: new.initiator,
            content: new.seed_content,
            created_at: Utc::now(),
        };

        guard.pairs.insert(pair, conversation.id);
        guard.members.insert(
            conversation.id,
            vec![
                Membership {
                    user_id: new.initiator,
                    unread: false,
                },
                Membership {
                    user_id: new.receiver,
                    unread: false,
                },
            ],
        );
        guard.messages.insert(conversation.id, vec![seed.clone()]);
        guard
            .conversations
            .insert(conversation.id, conversation.clone());

        Ok((conversation, seed))
    }

    async fn find_participants(&self, conversation_id: Uuid) -> AppResult<Vec<Participant>> {
        let guard = self.inner.read().await;
        let mut participants: Vec<Participant> = guard
            .members
            .get(&conversation_id)
            .map(|members| {
                members
                    .iter()
                    .map(|m| Participant {
                        user_id: m.user_id,
                        name: guard.users.get(&m.user_id).cloned().unwrap_or_default(),
                        unread: m.unread,
                    })
                    .collect()
            })
            .unwrap_or_default();
        participants.sort_by_key(|p| p.user_id);
        Ok(participants)
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<MemberConversation>> {
        let guard = self.inner.read().await;
        let mut out = Vec::new();
        for (conversation_id, members) in &guard.members {
            if let Some(m) = members.iter().find(|m| m.user_id == user_id) {
                if let Some(conversation) = guard.conversations.get(conversation_id) {
                    out.push(MemberConversation {
                        conversation: conversation.clone(),
                        unread: m.unread,
                    });
                }
            }
        }
        Ok(out)
    }

    async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.members.get_mut(&conversation_id) {
            if let Some(m) = members.iter_mut().find(|m| m.user_id == user_id) {
                m.unread = false;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let mut guard = self.inner.write().await;
        if !guard.conversations.contains_key(&conversation_id) {
            return Err(AppError::NotFound);
        }

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        guard
            .messages
            .entry(conversation_id)
            .or_default()
            .push(message.clone());

        if let Some(members) = guard.members.get_mut(&conversation_id) {
            for m in members.iter_mut() {
                if m.user_id != sender_id {
                    m.unread = true;
                }
            }
        }

        Ok(message)
    }

    async fn list(&self, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let guard = self.inner.read().await;
        Ok(guard
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn last_message(&self, conversation_id: Uuid) -> AppResult<Option<Message>> {
        let guard = self.inner.read().await;
        Ok(guard
            .messages
            .get(&conversation_id)
            .and_then(|msgs| msgs.last())
            .cloned())
    }
}
