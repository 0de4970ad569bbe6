//! Conversation/messaging domain core.
//!
//! Requester identity is an explicit parameter on every operation, and
//! membership is checked against the live participant set on each call.
//! Notification fan-out runs strictly after the owning store write commits
//! and never turns into a caller-visible error.

use crate::error::{AppError, AppResult};
use crate::models::{
    Conversation, ConversationSummary, ConversationView, MessageView, Participant, UserSummary,
};
use crate::notify::NotificationPublisher;
use crate::store::{ConversationStore, MessageStore, NewConversation, UserStore};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// First message of every new conversation, authored by the initiator.
pub const SEED_MESSAGE: &str = "Created this conversation.";

pub struct ChatService {
    users: Arc<dyn UserStore>,
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    publisher: Arc<dyn NotificationPublisher>,
}

impl ChatService {
    pub fn new(
        users: Arc<dyn UserStore>,
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            users,
            conversations,
            messages,
            publisher,
        }
    }

    /// Everyone except the requester, id and name only, ordered by id.
    pub async fn list_other_users(&self, requester: Uuid) -> AppResult<Vec<UserSummary>> {
        self.users.list_other_users(requester).await
    }

    /// The requester's conversations, most recently active first.
    /// Conversations with no messages sort after all the rest.
    pub async fn list_conversations(
        &self,
        requester: Uuid,
    ) -> AppResult<Vec<ConversationSummary>> {
        let involved = self.conversations.list_for_user(requester).await?;

        let mut summaries = Vec::with_capacity(involved.len());
        for entry in involved {
            let participants = self
                .conversations
                .find_participants(entry.conversation.id)
                .await?;
            let last_message = self.messages.last_message(entry.conversation.id).await?;
            summaries.push(ConversationSummary {
                id: entry.conversation.id,
                name: entry.conversation.name,
                created_at: entry.conversation.created_at,
                participants: participants.iter().map(Participant::summary).collect(),
                unread: entry.unread,
                last_message,
            });
        }

        sort_by_recency(&mut summaries);
        Ok(summaries)
    }

    pub async fn get_conversation(
        &self,
        requester: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<ConversationView> {
        let (conversation, participants) =
            self.authorize(requester, conversation_id).await?;
        Ok(view(conversation, &participants))
    }

    /// All messages oldest to newest, sender attached. Clears the
    /// requester's unread flag for this conversation.
    pub async fn list_messages(
        &self,
        requester: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<Vec<MessageView>> {
        let (_, participants) = self.authorize(requester, conversation_id).await?;

        let messages = self.messages.list(conversation_id).await?;
        self.conversations
            .mark_read(conversation_id, requester)
            .await?;

        let names: HashMap<Uuid, String> = participants
            .iter()
            .map(|p| (p.user_id, p.name.clone()))
            .collect();

        let mut views = Vec::with_capacity(messages.len());
        for message in messages {
            let name = match names.get(&message.sender_id) {
                Some(name) => name.clone(),
                None => self
                    .users
                    .find_user(message.sender_id)
                    .await?
                    .map(|u| u.name)
                    .unwrap_or_default(),
            };
            views.push(message.into_view(name));
        }
        Ok(views)
    }

    /// Returns the existing conversation between the pair, or creates one
    /// with both memberships and the seed message. Repeated calls, in either
    /// argument order and under concurrency, settle on a single conversation.
    pub async fn create_conversation(
        &self,
        requester: Uuid,
        receiver_id: Uuid,
    ) -> AppResult<ConversationView> {
        if receiver_id == requester {
            return Err(AppError::Validation(
                "cannot start a conversation with yourself".into(),
            ));
        }

        let receiver = self
            .users
            .find_user(receiver_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let initiator = self
            .users
            .find_user(requester)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if let Some(existing) = self
            .conversations
            .find_direct_between(requester, receiver_id)
            .await?
        {
            let participants = self.conversations.find_participants(existing.id).await?;
            return Ok(view(existing, &participants));
        }

        let new = NewConversation {
            name: format!("{} and {}", initiator.name, receiver.name),
            initiator: requester,
            receiver: receiver_id,
            seed_content: SEED_MESSAGE.to_string(),
        };

        let conversation = match self.conversations.create_direct(new).await {
            Ok((conversation, _seed)) => {
                self.publish(conversation.id, &[requester, receiver_id]).await;
                conversation
            }
            // Lost the create race; the winner already exists (and already
            // published its seed event), so hand back its conversation.
            Err(AppError::Conflict) => self
                .conversations
                .find_direct_between(requester, receiver_id)
                .await?
                .ok_or(AppError::Internal)?,
            Err(e) => return Err(e),
        };

        let participants = self.conversations.find_participants(conversation.id).await?;
        Ok(view(conversation, &participants))
    }

    /// Persists a message and flags every other participant unread, then
    /// fans the event out. Returns the created message so callers and tests
    /// can assert on it.
    pub async fn send_message(
        &self,
        requester: Uuid,
        conversation_id: Uuid,
        content: &str,
    ) -> AppResult<MessageView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("message content is required".into()));
        }

        let (_, participants) = self.authorize(requester, conversation_id).await?;

        let message = self
            .messages
            .append(conversation_id, requester, content)
            .await?;

        let participant_ids: Vec<Uuid> = participants.iter().map(|p| p.user_id).collect();
        self.publish(conversation_id, &participant_ids).await;

        let sender_name = participants
            .iter()
            .find(|p| p.user_id == requester)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Ok(message.into_view(sender_name))
    }

    /// NotFound when the conversation does not exist, Forbidden when the
    /// requester is not in its current participant set.
    async fn authorize(
        &self,
        requester: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<(Conversation, Vec<Participant>)> {
        let conversation = self
            .conversations
            .get(conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let participants = self.conversations.find_participants(conversation_id).await?;
        if !participants.iter().any(|p| p.user_id == requester) {
            return Err(AppError::Forbidden);
        }
        Ok((conversation, participants))
    }

    async fn publish(&self, conversation_id: Uuid, participant_ids: &[Uuid]) {
        if let Err(e) = self
            .publisher
            .publish_new_message(conversation_id, participant_ids)
            .await
        {
            tracing::warn!(%conversation_id, error = %e, "new-message fan-out failed");
        }
    }
}

fn view(conversation: Conversation, participants: &[Participant]) -> ConversationView {
    ConversationView {
        id: conversation.id,
        name: conversation.name,
        created_at: conversation.created_at,
        participants: participants.iter().map(Participant::summary).collect(),
    }
}

/// Most recently active first. A conversation with no messages has no
/// recency at all and lands after every conversation that has one; the sort
/// is stable, so equal keys keep their incoming order.
fn sort_by_recency(summaries: &mut [ConversationSummary]) {
    summaries.sort_by(|a, b| match (&a.last_message, &b.last_message) {
        (Some(x), Some(y)) => y
            .created_at
            .cmp(&x.created_at)
            .then_with(|| y.id.cmp(&x.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use crate::notify::PublishError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<(Uuid, Vec<Uuid>)>>,
    }

    #[async_trait]
    impl NotificationPublisher for RecordingPublisher {
        async fn publish_new_message(
            &self,
            conversation_id: Uuid,
            participant_ids: &[Uuid],
        ) -> Result<(), PublishError> {
            self.events
                .lock()
                .unwrap()
                .push((conversation_id, participant_ids.to_vec()));
            Ok(())
        }
    }

    struct Fixture {
        service: ChatService,
        store: MemoryStore,
        publisher: Arc<RecordingPublisher>,
        alice: Uuid,
        bob: Uuid,
        carol: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let publisher = Arc::new(RecordingPublisher::default());
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.add_user(alice, "Alice").await;
        store.add_user(bob, "Bob").await;
        store.add_user(carol, "Carol").await;

        let service = ChatService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            publisher.clone(),
        );
        Fixture {
            service,
            store,
            publisher,
            alice,
            bob,
            carol,
        }
    }

    fn summary(id: Uuid, last_at: Option<DateTime<Utc>>) -> ConversationSummary {
        ConversationSummary {
            id,
            name: "x".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            participants: Vec::new(),
            unread: false,
            last_message: last_at.map(|created_at| Message {
                id: Uuid::new_v4(),
                conversation_id: id,
                sender_id: Uuid::new_v4(),
                content: "hi".to_string(),
                created_at,
            }),
        }
    }

    #[test]
    fn recency_sort_puts_latest_first_and_empty_last() {
        let t = |h| Utc.with_ymd_and_hms(2024, 6, 1, h, 0, 0).unwrap();
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let mut summaries = vec![
            summary(a, Some(t(9))),
            summary(b, None),
            summary(c, Some(t(18))),
            summary(d, Some(t(12))),
        ];
        sort_by_recency(&mut summaries);

        let order: Vec<Uuid> = summaries.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![c, d, a, b]);
    }

    #[test]
    fn recency_sort_handles_all_empty_without_failing() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut summaries = vec![summary(a, None), summary(b, None)];
        sort_by_recency(&mut summaries);
        // stable: incoming order preserved
        assert_eq!(summaries[0].id, a);
        assert_eq!(summaries[1].id, b);
    }

    #[tokio::test]
    async fn list_other_users_excludes_the_requester() {
        let fx = fixture().await;
        let users = fx.service.list_other_users(fx.alice).await.unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.id != fx.alice));
    }

    #[tokio::test]
    async fn create_conversation_is_idempotent_per_pair() {
        let fx = fixture().await;

        let first = fx
            .service
            .create_conversation(fx.alice, fx.bob)
            .await
            .unwrap();
        // reversed direction resolves to the same conversation
        let second = fx
            .service
            .create_conversation(fx.bob, fx.alice)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "Alice and Bob");
        assert_eq!(first.participants.len(), 2);
        // only the actual create published
        assert_eq!(fx.publisher.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_conversation_unknown_receiver_is_not_found() {
        let fx = fixture().await;
        let err = fx
            .service
            .create_conversation(fx.alice, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn create_conversation_with_self_is_rejected() {
        let fx = fixture().await;
        let err = fx
            .service
            .create_conversation(fx.alice, fx.alice)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn send_message_flags_unread_for_receiver_only() {
        let fx = fixture().await;
        let conversation = fx
            .service
            .create_conversation(fx.alice, fx.bob)
            .await
            .unwrap();

        fx.service
            .send_message(fx.alice, conversation.id, "hello")
            .await
            .unwrap();

        let participants = fx.store.find_participants(conversation.id).await.unwrap();
        for p in participants {
            assert_eq!(p.unread, p.user_id == fx.bob);
        }
    }

    #[tokio::test]
    async fn blank_content_is_rejected_and_persists_nothing() {
        let fx = fixture().await;
        let conversation = fx
            .service
            .create_conversation(fx.alice, fx.bob)
            .await
            .unwrap();
        let before = fx.store.list(conversation.id).await.unwrap().len();

        for blank in ["", "   ", "\n\t"] {
            let err = fx
                .service
                .send_message(fx.alice, conversation.id, blank)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }

        assert_eq!(fx.store.list(conversation.id).await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn non_participants_are_forbidden_with_no_side_effects() {
        let fx = fixture().await;
        let conversation = fx
            .service
            .create_conversation(fx.alice, fx.bob)
            .await
            .unwrap();
        let published_before = fx.publisher.events.lock().unwrap().len();

        let get = fx
            .service
            .get_conversation(fx.carol, conversation.id)
            .await
            .unwrap_err();
        let list = fx
            .service
            .list_messages(fx.carol, conversation.id)
            .await
            .unwrap_err();
        let send = fx
            .service
            .send_message(fx.carol, conversation.id, "hi")
            .await
            .unwrap_err();

        assert!(matches!(get, AppError::Forbidden));
        assert!(matches!(list, AppError::Forbidden));
        assert!(matches!(send, AppError::Forbidden));
        assert_eq!(fx.store.list(conversation.id).await.unwrap().len(), 1);
        assert_eq!(fx.publisher.events.lock().unwrap().len(), published_before);
    }

    #[tokio::test]
    async fn missing_conversation_is_not_found() {
        let fx = fixture().await;
        let err = fx
            .service
            .get_conversation(fx.alice, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn list_messages_marks_the_reader_as_caught_up() {
        let fx = fixture().await;
        let conversation = fx
            .service
            .create_conversation(fx.alice, fx.bob)
            .await
            .unwrap();
        fx.service
            .send_message(fx.alice, conversation.id, "hello")
            .await
            .unwrap();

        let messages = fx
            .service
            .list_messages(fx.bob, conversation.id)
            .await
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, SEED_MESSAGE);
        assert_eq!(messages[0].sender.name, "Alice");
        assert_eq!(messages[1].content, "hello");

        let bob = fx
            .store
            .find_participants(conversation.id)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.user_id == fx.bob)
            .unwrap();
        assert!(!bob.unread);
    }

    #[tokio::test]
    async fn send_message_fans_out_to_every_participant_channel_once() {
        let fx = fixture().await;
        let conversation = fx
            .service
            .create_conversation(fx.alice, fx.bob)
            .await
            .unwrap();

        fx.service
            .send_message(fx.alice, conversation.id, "hello")
            .await
            .unwrap();

        let events = fx.publisher.events.lock().unwrap();
        let (conversation_id, participants) = events.last().unwrap();
        assert_eq!(*conversation_id, conversation.id);
        let mut expected = vec![fx.alice, fx.bob];
        expected.sort();
        let mut got = participants.clone();
        got.sort();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn list_conversations_carries_unread_and_last_message() {
        let fx = fixture().await;
        let with_bob = fx
            .service
            .create_conversation(fx.alice, fx.bob)
            .await
            .unwrap();
        let with_carol = fx
            .service
            .create_conversation(fx.alice, fx.carol)
            .await
            .unwrap();
        fx.service
            .send_message(fx.bob, with_bob.id, "newest")
            .await
            .unwrap();

        let listed = fx.service.list_conversations(fx.alice).await.unwrap();

        assert_eq!(listed.len(), 2);
        // bob's conversation got the newer message, so it leads
        assert_eq!(listed[0].id, with_bob.id);
        assert!(listed[0].unread);
        assert_eq!(
            listed[0].last_message.as_ref().unwrap().content,
            "newest"
        );
        assert_eq!(listed[1].id, with_carol.id);
        assert!(!listed[1].unread);
    }
}
