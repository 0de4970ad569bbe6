//! New-message fan-out.
//!
//! After a message append commits, one event is delivered to each
//! participant's private channel. Delivery is best effort: the service logs
//! failures and never unwinds the committed write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod redis_publisher;

pub use redis_publisher::RedisPublisher;

pub const NEW_MESSAGE_EVENT: &str = "message.new";

/// Private channel name for one user. Deterministic so clients can subscribe
/// before any conversation exists.
pub fn channel_for_user(user_id: Uuid) -> String {
    format!("new-message-notification.{user_id}")
}

/// Payload carried on every participant channel. Holds the conversation id
/// only; subscribers refetch the conversation state they care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessageEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub conversation_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl NewMessageEvent {
    pub fn new(conversation_id: Uuid) -> Self {
        Self {
            kind: NEW_MESSAGE_EVENT.to_string(),
            conversation_id,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("redis publish: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Delivers one new-message event per participant channel. Partial
    /// failure still attempts the remaining channels before reporting.
    async fn publish_new_message(
        &self,
        conversation_id: Uuid,
        participant_ids: &[Uuid],
    ) -> Result<(), PublishError>;
}

/// Publisher that drops everything. Used by tests and by local runs without
/// a Redis endpoint.
pub struct NoopPublisher;

#[async_trait]
impl NotificationPublisher for NoopPublisher {
    async fn publish_new_message(
        &self,
        _conversation_id: Uuid,
        _participant_ids: &[Uuid],
    ) -> Result<(), PublishError> {
        Ok(())
    }
}
