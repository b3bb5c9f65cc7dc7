use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Broadcast hub fanning events out to every SSE subscriber.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_sent_after_joining() {
        let hub = SseHub::new(4);
        hub.broadcast(ServerEvent::json(Some("early".into()), &1).unwrap());

        let mut rx = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        hub.broadcast(ServerEvent::json(Some("late".into()), &2).unwrap());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("late"));
        assert_eq!(event.data, "2");
    }
}
