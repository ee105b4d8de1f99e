//! Bus Events
//!
//! Everything that crosses the bus is an [`Event`]: a topic, the id of the
//! component that produced it and a JSON payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::{ServiceError, ServiceResult};

// ─────────────────────────────────────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Topic the event was published on (e.g. "/topic/command", "display/frame")
    pub topic: String,

    /// Producer of the event
    pub source: String,

    pub payload: serde_json::Value,

    /// Publication time
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(
        topic: impl Into<String>,
        source: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            topic: topic.into(),
            source: source.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Event without payload
    pub fn signal(topic: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(topic, source, serde_json::Value::Null)
    }

    /// Serialize `payload` into a new event
    pub fn with_payload<T: Serialize>(
        topic: impl Into<String>,
        source: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(topic, source, serde_json::to_value(payload)?))
    }

    /// Whether this event is delivered to subscribers of `pattern`
    pub fn matches(&self, pattern: &str) -> bool {
        topic_matches(&self.topic, pattern)
    }

    /// Get a string field from the payload
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }

    /// Deserialize the payload
    pub fn parse_payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// Topic pattern matching.
///
/// - `*` matches every topic
/// - `prefix/*` matches topics below `prefix/` (not `prefix` itself)
/// - anything else is an exact match
pub fn topic_matches(topic: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    match pattern.strip_suffix('*') {
        Some(prefix) if prefix.ends_with('/') => topic.starts_with(prefix),
        _ => topic == pattern,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event Publisher
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable handle for putting events on the bus
#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<Event>,
}

impl EventPublisher {
    pub fn new(tx: broadcast::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event: Event) -> ServiceResult<usize> {
        self.tx.send(event).map_err(|_| ServiceError::ChannelClosed)
    }

    /// Build and publish an event
    pub fn emit(
        &self,
        topic: impl Into<String>,
        source: impl Into<String>,
        payload: serde_json::Value,
    ) -> ServiceResult<usize> {
        self.publish(Event::new(topic, source, payload))
    }

    /// Observe every event published on the bus
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
