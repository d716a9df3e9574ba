use chrono::Utc;
use dashmap::DashMap;
use sandbox_types::UserId;
use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// The `file_update` envelope pushed to subscribed browser tabs.
#[derive(Debug, Clone, Serialize)]
pub struct FileUpdateEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub action: &'static str,
    pub path: String,
    pub timestamp: String,
}

impl FileUpdateEvent {
    pub fn new(action: &'static str, path: impl Into<String>) -> Self {
        Self {
            kind: "file_update",
            action,
            path: path.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// §4.7 notification bus: fans out filesystem events to every WebSocket
/// subscribed for a given user. Built on one [`broadcast::Sender`] per user
/// rather than a literal "set of sockets" — each subscriber keeps its own
/// receiver and is dropped independently on send failure or disconnect,
/// which gives the same fan-out semantics without a shared mutable set.
#[derive(Default)]
pub struct NotifyBus {
    channels: DashMap<UserId, broadcast::Sender<FileUpdateEvent>>,
}

impl NotifyBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// `subscribe(user_id, ws)`: returns a receiver for the user's channel,
    /// creating it if this is the first subscriber.
    pub fn subscribe(&self, user_id: &UserId) -> broadcast::Receiver<FileUpdateEvent> {
        self.channels
            .entry(user_id.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// `publish(user_id, event)`: sends to every open subscriber. No
    /// subscribers is not an error — `send` on an empty channel is a no-op
    /// from the publisher's point of view (P7/§7: the bus never fails
    /// publishers).
    pub fn publish(&self, user_id: &UserId, event: FileUpdateEvent) {
        if let Some(tx) = self.channels.get(user_id) {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = NotifyBus::new();
        let user = "alice".to_string();
        let mut rx = bus.subscribe(&user);

        bus.publish(&user, FileUpdateEvent::new("create", "/workspace/a.txt"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.action, "create");
        assert_eq!(event.path, "/workspace/a.txt");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = NotifyBus::new();
        bus.publish(&"nobody".to_string(), FileUpdateEvent::new("delete", "/workspace/x"));
    }
}
