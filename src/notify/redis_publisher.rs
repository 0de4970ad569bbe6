use crate::notify::{channel_for_user, NewMessageEvent, NotificationPublisher, PublishError};
use crate::redis_client::RedisClient;
use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

/// Redis pub/sub transport for new-message events. One PUBLISH per
/// participant channel; the event body is identical on every channel.
pub struct RedisPublisher {
    client: RedisClient,
}

impl RedisPublisher {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationPublisher for RedisPublisher {
    async fn publish_new_message(
        &self,
        conversation_id: Uuid,
        participant_ids: &[Uuid],
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&NewMessageEvent::new(conversation_id))?;
        let mut conn = self.client.connection();

        let mut first_failure: Option<PublishError> = None;
        for user_id in participant_ids {
            let channel = channel_for_user(*user_id);
            if let Err(e) = conn.publish::<_, _, ()>(&channel, &payload).await {
                tracing::warn!(%channel, %conversation_id, error = %e, "publish failed");
                first_failure.get_or_insert(PublishError::Redis(e));
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
