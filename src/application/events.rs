//! Real-time event fanout
//!
//! Process-wide one-to-many broadcast of registry and presence changes to
//! connected agent clients. Delivery is best-effort; each subscriber observes
//! events in publication order.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Event pushed to agent clients over the WebSocket channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentEvent {
    #[serde(rename_all = "camelCase")]
    IncomingCall {
        call_sid: String,
        from: String,
        to: String,
        conference_name: String,
        status: String,
    },
    #[serde(rename_all = "camelCase")]
    CallStatusUpdated {
        call_sid: String,
        status: String,
        from: String,
        to: String,
        duration: Option<u64>,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    CallEnded {
        call_sid: String,
        status: String,
        timestamp: String,
    },
    #[serde(rename_all = "camelCase")]
    AgentConnected { agent_id: Uuid },
    #[serde(rename_all = "camelCase")]
    AgentDisconnected { agent_id: Uuid },
    #[serde(rename_all = "camelCase")]
    AgentStatusUpdated { agent_id: Uuid, status: String },
}

/// Broadcast envelope. `exclude` suppresses delivery to one connection so an
/// agent's own status update is not echoed back to it.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub exclude: Option<Uuid>,
    pub event: AgentEvent,
}

/// Event broadcaster
pub struct EventBroadcaster {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBroadcaster {
    /// Create a broadcaster with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Broadcast to every connected client
    pub fn publish(&self, event: AgentEvent) {
        self.send(EventEnvelope {
            exclude: None,
            event,
        });
    }

    /// Broadcast to every client except `origin`
    pub fn publish_excluding(&self, origin: Uuid, event: AgentEvent) {
        self.send(EventEnvelope {
            exclude: Some(origin),
            event,
        });
    }

    fn send(&self, envelope: EventEnvelope) {
        // A send error only means no subscriber is connected right now
        if self.tx.send(envelope).is_err() {
            debug!("No agent clients connected, event dropped");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let broadcaster = EventBroadcaster::new(16);
        let mut rx1 = broadcaster.subscribe();
        let mut rx2 = broadcaster.subscribe();

        broadcaster.publish(AgentEvent::CallEnded {
            call_sid: "CA1".to_string(),
            status: "completed".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        });

        for rx in [&mut rx1, &mut rx2] {
            let envelope = rx.recv().await.unwrap();
            assert!(envelope.exclude.is_none());
            match envelope.event {
                AgentEvent::CallEnded { call_sid, .. } => assert_eq!(call_sid, "CA1"),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_publish_excluding_marks_origin() {
        let broadcaster = EventBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();
        let origin = Uuid::new_v4();

        broadcaster.publish_excluding(
            origin,
            AgentEvent::AgentStatusUpdated {
                agent_id: origin,
                status: "busy".to_string(),
            },
        );

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.exclude, Some(origin));
    }

    #[test]
    fn test_event_serialization_uses_wire_names() {
        let event = AgentEvent::IncomingCall {
            call_sid: "CA1".to_string(),
            from: "+15550001".to_string(),
            to: "+15559999".to_string(),
            conference_name: "conf_15550001_CA1".to_string(),
            status: "ringing".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"incomingCall\""));
        assert!(json.contains("\"callSid\":\"CA1\""));
        assert!(json.contains("\"conferenceName\":\"conf_15550001_CA1\""));
    }

    #[test]
    fn test_publish_without_subscribers_is_best_effort() {
        let broadcaster = EventBroadcaster::new(16);
        broadcaster.publish(AgentEvent::AgentConnected {
            agent_id: Uuid::new_v4(),
        });
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
