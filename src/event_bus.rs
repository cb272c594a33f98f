use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use uuid::Uuid;

use crate::types::{Notification, NotificationKind};

const BUS_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to publish on channel {0}")]
    Publish(String),
}

/// Payload published for every stored notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub related_entity_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationEvent {
    fn from(notification: &Notification) -> Self {
        Self {
            notification_id: notification.id,
            user_id: notification.user_id,
            kind: notification.kind,
            message: notification.message.clone(),
            related_entity_id: notification.related_entity_id,
            created_at: notification.created_at,
        }
    }
}

/// Outbound message bus. Delivery is best effort.
#[cfg_attr(test, mockall::automock)]
pub trait EventBus: Send + Sync + 'static {
    fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}

/// In-process bus fanning messages out to every live subscriber.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    sender: Sender<BusMessage>,
}

impl Default for BroadcastBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }
}

impl BroadcastBus {
    pub fn subscribe(&self) -> BroadcastStream<BusMessage> {
        BroadcastStream::new(self.sender.subscribe())
    }
}

impl EventBus for BroadcastBus {
    fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        let message = BusMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        };
        // No subscribers is not a failure, the message is simply dropped.
        match self.sender.send(message) {
            Ok(receivers) => debug!(channel, receivers, "Published event"),
            Err(_) => debug!(channel, "Published event without subscribers"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_subscribers_receive_published_messages() {
        let bus = BroadcastBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish("notifications", "{\"hello\":1}").unwrap();

        let expected = BusMessage {
            channel: "notifications".into(),
            payload: "{\"hello\":1}".into(),
        };
        assert_eq!(first.next().await.unwrap().unwrap(), expected);
        assert_eq!(second.next().await.unwrap().unwrap(), expected);
    }

    #[test]
    fn test_publish_without_subscribers_succeeds() {
        let bus = BroadcastBus::default();
        bus.publish("notifications", "payload").unwrap();
    }
}
