//! Service Handle
//!
//! Each service task owns a private inbox next to its bus subscription. The
//! bus is a lossy broadcast; the inbox is a bounded queue whose senders wait
//! for room, so helper tasks feeding a service (a serial reader, say) slow
//! down instead of losing events.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::{mpsc, oneshot};

use super::{Event, ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    Starting = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
    Failed = 4,
}

impl ServiceState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Stopping,
            3 => Self::Stopped,
            _ => Self::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state written by the service task, readable from any handle
#[derive(Debug, Clone)]
pub(crate) struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub(crate) fn new(state: ServiceState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    pub(crate) fn get(&self) -> ServiceState {
        ServiceState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: ServiceState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Messages on a service's inbox
pub enum ServiceCommand {
    /// Deliver an event regardless of the service's topics
    Event(Event),
    Shutdown,
    GetState(oneshot::Sender<ServiceState>),
}

/// Sending side of a service's inbox
#[derive(Clone)]
pub struct ServiceInbox {
    tx: mpsc::Sender<ServiceCommand>,
}

impl ServiceInbox {
    pub fn new(tx: mpsc::Sender<ServiceCommand>) -> Self {
        Self { tx }
    }

    /// Queue `event` for the service, waiting while the inbox is full.
    ///
    /// Events from one inbox reach `on_event` in the order they were sent.
    pub async fn deliver(&self, event: Event) -> ServiceResult<()> {
        self.send(ServiceCommand::Event(event)).await
    }

    async fn send(&self, command: ServiceCommand) -> ServiceResult<()> {
        self.tx.send(command).await.map_err(|_| ServiceError::ChannelClosed)
    }
}

/// Cloneable handle to a spawned service
#[derive(Clone)]
pub struct ServiceHandle {
    pub service_id: String,
    inbox: ServiceInbox,
    state: SharedState,
}

impl ServiceHandle {
    pub(crate) fn new(service_id: String, inbox: ServiceInbox, state: SharedState) -> Self {
        Self {
            service_id,
            inbox,
            state,
        }
    }

    /// Last state stored by the service task
    pub fn state(&self) -> ServiceState {
        self.state.get()
    }

    pub fn inbox(&self) -> ServiceInbox {
        self.inbox.clone()
    }

    /// Deliver an event straight to this service, bypassing the bus
    pub async fn deliver(&self, event: Event) -> ServiceResult<()> {
        self.inbox.deliver(event).await.map_err(|_| self.not_running())
    }

    /// Request graceful shutdown
    pub async fn shutdown(&self) -> ServiceResult<()> {
        self.inbox
            .send(ServiceCommand::Shutdown)
            .await
            .map_err(|_| self.not_running())
    }

    /// Ask the service task for its state. The answer comes after every
    /// inbox message sent before it has been handled.
    pub async fn request_state(&self) -> ServiceResult<ServiceState> {
        let (tx, rx) = oneshot::channel();
        self.inbox
            .send(ServiceCommand::GetState(tx))
            .await
            .map_err(|_| self.not_running())?;

        rx.await.map_err(|_| ServiceError::ChannelClosed)
    }

    fn not_running(&self) -> ServiceError {
        ServiceError::NotRunning(self.service_id.clone())
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("service_id", &self.service_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_state_visible_to_handle() {
        let (tx, _rx) = mpsc::channel(1);
        let state = SharedState::new(ServiceState::Starting);
        let handle = ServiceHandle::new("display".into(), ServiceInbox::new(tx), state.clone());
        assert_eq!(handle.state(), ServiceState::Starting);

        state.set(ServiceState::Running);
        assert_eq!(handle.state(), ServiceState::Running);
        assert_eq!(handle.state().to_string(), "running");
    }

    #[tokio::test]
    async fn test_full_inbox_waits_for_room() {
        let (tx, mut rx) = mpsc::channel(1);
        let inbox = ServiceInbox::new(tx);
        inbox.deliver(Event::signal("a", "test")).await.unwrap();

        let pending = tokio::spawn({
            let inbox = inbox.clone();
            async move { inbox.deliver(Event::signal("b", "test")).await }
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        let mut topics = Vec::new();
        for _ in 0..2 {
            if let Some(ServiceCommand::Event(event)) = rx.recv().await {
                topics.push(event.topic);
            }
        }
        pending.await.unwrap().unwrap();
        assert_eq!(topics, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_deliver_to_stopped_service_fails() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = ServiceHandle::new(
            "display".into(),
            ServiceInbox::new(tx),
            SharedState::new(ServiceState::Stopped),
        );

        let result = handle.deliver(Event::signal("a", "test")).await;
        assert!(matches!(result, Err(ServiceError::NotRunning(id)) if id == "display"));
    }
}
