//! Service Lifecycle
//!
//! A service is a long-running component attached to the event bus. The
//! runtime drives it through three hooks:
//! - `on_start`: open resources, spawn helper tasks
//! - `on_event`: one call per bus event matching the service's topics, and
//!   per event delivered to the service's inbox
//! - `on_stop`: release resources
//!
//! Hooks are never invoked concurrently for the same service.

mod event;
mod handle;
mod manager;

pub use event::*;
pub use handle::*;
pub use manager::*;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Service Error
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by the service runtime or by service hooks
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Service already running: {0}")]
    AlreadyRunning(String),

    #[error("Service not running: {0}")]
    NotRunning(String),

    #[error("Event handling failed: {0}")]
    EventError(String),

    #[error("Shutdown timeout")]
    ShutdownTimeout,

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

// ─────────────────────────────────────────────────────────────────────────────
// Service Specification
// ─────────────────────────────────────────────────────────────────────────────

/// Static description of a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Unique service identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Topic patterns delivered to `on_event` (e.g. "display/frame", "settings/*")
    #[serde(default)]
    pub topics: Vec<String>,

    /// Whether a second service with the same id is rejected
    #[serde(default = "default_singleton")]
    pub singleton: bool,

    /// Upper bound for `on_stop`
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_singleton() -> bool {
    true
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for ServiceSpec {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            topics: Vec::new(),
            singleton: default_singleton(),
            shutdown_timeout: default_shutdown_timeout(),
            description: None,
        }
    }
}

impl ServiceSpec {
    /// Create a spec with the required fields
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a single topic pattern
    pub fn subscribe(mut self, pattern: impl Into<String>) -> Self {
        self.topics.push(pattern.into());
        self
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Whether an event topic is delivered to this service
    pub fn wants(&self, topic: &str) -> bool {
        self.topics.iter().any(|pattern| topic_matches(topic, pattern))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context handed to every lifecycle hook
pub struct ServiceContext {
    /// Service unique identifier
    pub service_id: String,

    publisher: EventPublisher,

    inbox: ServiceInbox,
}

impl ServiceContext {
    pub fn new(service_id: String, publisher: EventPublisher, inbox: ServiceInbox) -> Self {
        Self {
            service_id,
            publisher,
            inbox,
        }
    }

    /// This service's own inbox, for helper tasks whose events must not be
    /// dropped when the bus is busy
    pub fn inbox(&self) -> ServiceInbox {
        self.inbox.clone()
    }

    /// A publisher that outlives the hook call, for helper tasks
    pub fn publisher(&self) -> EventPublisher {
        self.publisher.clone()
    }

    /// Publish an event on the bus
    pub fn publish(&self, event: Event) -> ServiceResult<()> {
        self.publisher.publish(event).map(|_| ())
    }

    /// Build and publish an event sourced from this service
    pub fn emit(&self, topic: impl Into<String>, payload: serde_json::Value) -> ServiceResult<()> {
        self.publish(Event::new(topic, &self.service_id, payload))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A component managed by the [`ServiceManager`]
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Returns the service specification
    fn spec(&self) -> ServiceSpec;

    /// Called once before any event is delivered.
    ///
    /// Returning an error marks the service failed; no event is delivered.
    async fn on_start(&mut self, ctx: &ServiceContext) -> ServiceResult<()>;

    /// Called once when the service stops, even after errors in `on_event`.
    async fn on_stop(&mut self, ctx: &ServiceContext) -> ServiceResult<()>;

    /// Called for every bus event whose topic matches the spec.
    async fn on_event(&mut self, _ctx: &ServiceContext, _event: Event) -> ServiceResult<()> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_spec_builder() {
        let spec = ServiceSpec::new("display/serial", "Display")
            .subscribe("display/frame")
            .subscribe("settings/*")
            .with_shutdown_timeout(Duration::from_secs(2))
            .singleton(true);

        assert_eq!(spec.id, "display/serial");
        assert_eq!(spec.name, "Display");
        assert_eq!(spec.topics, vec!["display/frame", "settings/*"]);
        assert_eq!(spec.shutdown_timeout, Duration::from_secs(2));
        assert!(spec.singleton);
    }

    #[test]
    fn test_spec_wants_topic() {
        let spec = ServiceSpec::new("svc", "Svc")
            .subscribe("/topic/command")
            .subscribe("display/*");

        assert!(spec.wants("/topic/command"));
        assert!(spec.wants("display/frame"));
        assert!(!spec.wants("/topic/notifications"));
    }
}
