use crate::error::{AppError, AppResult};
use crate::models::{Conversation, MemberConversation, Message, Participant, UserSummary};
use crate::store::{sorted_pair, ConversationStore, MessageStore, NewConversation, UserStore};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use uuid::Uuid;

/// Postgres-backed store. One struct implements all three store interfaces
/// against the same pool so cross-entity writes can share a transaction.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn conversation_from_row(row: &Row) -> Conversation {
    Conversation {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

fn message_from_row(row: &Row) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

fn is_unique_violation(e: &tokio_postgres::Error) -> bool {
    e.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<UserSummary>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT id, name FROM users WHERE id = $1", &[&id])
            .await?;
        Ok(row.map(|r| UserSummary {
            id: r.get("id"),
            name: r.get("name"),
        }))
    }

    async fn list_other_users(&self, requester: Uuid) -> AppResult<Vec<UserSummary>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, name FROM users WHERE id <> $1 ORDER BY id",
                &[&requester],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| UserSummary {
                id: r.get("id"),
                name: r.get("name"),
            })
            .collect())
    }
}

#[async_trait]
impl ConversationStore for PostgresStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, name, created_at FROM conversations WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.map(|r| conversation_from_row(&r)))
    }

    async fn find_direct_between(&self, a: Uuid, b: Uuid) -> AppResult<Option<Conversation>> {
        let (low, high) = sorted_pair(a, b);
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, name, created_at FROM conversations
                 WHERE user_low = $1 AND user_high = $2",
                &[&low, &high],
            )
            .await?;
        Ok(row.map(|r| conversation_from_row(&r)))
    }

    async fn create_direct(&self, new: NewConversation) -> AppResult<(Conversation, Message)> {
        let (low, high) = sorted_pair(new.initiator, new.receiver);
        let conversation_id = Uuid::new_v4();
        let message_id = Uuid::new_v4();

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let conv_row = tx
            .query_one(
                "INSERT INTO conversations (id, name, user_low, user_high)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, name, created_at",
                &[&conversation_id, &new.name, &low, &high],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict
                } else {
                    AppError::from(e)
                }
            })?;

        tx.execute(
            "INSERT INTO conversation_members (conversation_id, user_id)
             VALUES ($1, $2), ($1, $3)",
            &[&conversation_id, &new.initiator, &new.receiver],
        )
        .await?;

        let msg_row = tx
            .query_one(
                "INSERT INTO messages (id, conversation_id, sender_id, content)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, conversation_id, sender_id, content, created_at",
                &[&message_id, &conversation_id, &new.initiator, &new.seed_content],
            )
            .await?;

        tx.commit().await?;

        Ok((
            conversation_from_row(&conv_row),
            message_from_row(&msg_row),
        ))
    }

    async fn find_participants(&self, conversation_id: Uuid) -> AppResult<Vec<Participant>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT cm.user_id, COALESCE(u.name, '') AS name, cm.unread
                 FROM conversation_members cm
                 LEFT JOIN users u ON u.id = cm.user_id
                 WHERE cm.conversation_id = $1
                 ORDER BY cm.user_id",
                &[&conversation_id],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Participant {
                user_id: r.get("user_id"),
                name: r.get("name"),
                unread: r.get("unread"),
            })
            .collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<MemberConversation>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT c.id, c.name, c.created_at, cm.unread
                 FROM conversations c
                 JOIN conversation_members cm ON cm.conversation_id = c.id
                 WHERE cm.user_id = $1",
                &[&user_id],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| MemberConversation {
                conversation: conversation_from_row(&r),
                unread: r.get("unread"),
            })
            .collect())
    }

    async fn mark_read(&self, conversation_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE conversation_members SET unread = FALSE
                 WHERE conversation_id = $1 AND user_id = $2",
                &[&conversation_id, &user_id],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for PostgresStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        let message_id = Uuid::new_v4();
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                "INSERT INTO messages (id, conversation_id, sender_id, content)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, conversation_id, sender_id, content, created_at",
                &[&message_id, &conversation_id, &sender_id, &content],
            )
            .await?;

        tx.execute(
            "UPDATE conversation_members SET unread = TRUE
             WHERE conversation_id = $1 AND user_id <> $2",
            &[&conversation_id, &sender_id],
        )
        .await?;

        tx.commit().await?;
        Ok(message_from_row(&row))
    }

    async fn list(&self, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, conversation_id, sender_id, content, created_at
                 FROM messages
                 WHERE conversation_id = $1
                 ORDER BY created_at ASC, id ASC",
                &[&conversation_id],
            )
            .await?;
        Ok(rows.iter().map(message_from_row).collect())
    }

    async fn last_message(&self, conversation_id: Uuid) -> AppResult<Option<Message>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, conversation_id, sender_id, content, created_at
                 FROM messages
                 WHERE conversation_id = $1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                &[&conversation_id],
            )
            .await?;
        Ok(row.map(|r| message_from_row(&r)))
    }
}
