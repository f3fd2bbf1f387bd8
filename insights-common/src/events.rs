//! Event types for the insights event system
//!
//! Provides the shared pipeline event definitions and the EventBus used to
//! fan them out to SSE clients and in-process listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Pipeline events
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Report kinds and stages travel as their URL names so that downstream
/// renderers need no knowledge of the service's types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum InsightsEvent {
    /// A stage request passed validation and is about to load its inputs
    StageStarted {
        report_kind: String,
        report_id: String,
        stage: String,
        slot: String,
        timestamp: DateTime<Utc>,
    },

    /// A stage wrote its section
    StageCompleted {
        report_kind: String,
        report_id: String,
        stage: String,
        slot: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A stage failed; the previous artifact (if any) is still in place
    StageFailed {
        report_kind: String,
        report_id: String,
        stage: String,
        slot: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Cached pages tied to these tags must be regenerated
    CacheTagsInvalidated {
        tags: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// The relay handed the next stage to the webhook
    NextStageDispatched {
        report_kind: String,
        report_id: String,
        next_stage: String,
        timestamp: DateTime<Utc>,
    },

    /// The relay could not hand the next stage to the webhook
    NextStageDispatchFailed {
        report_kind: String,
        report_id: String,
        next_stage: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl InsightsEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            InsightsEvent::StageStarted { .. } => "StageStarted",
            InsightsEvent::StageCompleted { .. } => "StageCompleted",
            InsightsEvent::StageFailed { .. } => "StageFailed",
            InsightsEvent::CacheTagsInvalidated { .. } => "CacheTagsInvalidated",
            InsightsEvent::NextStageDispatched { .. } => "NextStageDispatched",
            InsightsEvent::NextStageDispatchFailed { .. } => "NextStageDispatchFailed",
        }
    }
}

/// Broadcast bus for pipeline events
///
/// Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<InsightsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<InsightsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: InsightsEvent,
    ) -> Result<usize, broadcast::error::SendError<InsightsEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: InsightsEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalidated(tag: &str) -> InsightsEvent {
        InsightsEvent::CacheTagsInvalidated {
            tags: vec![tag.to_string()],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_error() {
        let bus = EventBus::new(8);
        assert!(bus.emit(invalidated("report:x")).is_err());
        // lossy variant must not panic
        bus.emit_lossy(invalidated("report:x"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(invalidated("a")).unwrap();
        bus.emit(invalidated("b")).unwrap();

        match rx.recv().await.unwrap() {
            InsightsEvent::CacheTagsInvalidated { tags, .. } => assert_eq!(tags, vec!["a"]),
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            InsightsEvent::CacheTagsInvalidated { tags, .. } => assert_eq!(tags, vec!["b"]),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_serialized_event_carries_type_tag() {
        let event = InsightsEvent::StageFailed {
            report_kind: "industry-tariff-reports".to_string(),
            report_id: "steel".to_string(),
            stage: "report-cover".to_string(),
            slot: String::new(),
            error: "Headings not found".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StageFailed");
        assert_eq!(json["error"], "Headings not found");
        assert_eq!(event.event_type(), "StageFailed");
    }
}
