//! Service Manager
//!
//! Owns the event bus and the task of every running service.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::handle::SharedState;
use super::{
    Event, EventPublisher, Service, ServiceCommand, ServiceContext, ServiceError, ServiceHandle,
    ServiceInbox, ServiceResult, ServiceSpec, ServiceState,
};

/// Capacity of the shared event bus
const BUS_CAPACITY: usize = 1024;

/// Capacity of each service's inbox
const INBOX_CAPACITY: usize = 256;

struct RunningService {
    handle: ServiceHandle,
    join_handle: JoinHandle<ServiceResult<()>>,
    spec: ServiceSpec,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Manager
// ─────────────────────────────────────────────────────────────────────────────

/// Spawns services, routes bus events to them and stops them
pub struct ServiceManager {
    services: DashMap<String, RunningService>,

    shutdown_tx: broadcast::Sender<()>,

    event_tx: broadcast::Sender<Event>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (event_tx, _) = broadcast::channel(BUS_CAPACITY);

        Self {
            services: DashMap::new(),
            shutdown_tx,
            event_tx,
        }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Publisher for components living outside a service
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher::new(self.event_tx.clone())
    }

    /// Observe every event on the bus
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Spawn a service on its own task.
    ///
    /// The service is subscribed to the bus before this returns, so events
    /// published afterwards are delivered once `on_start` has finished.
    pub async fn spawn<S: Service>(&self, service: S) -> ServiceResult<ServiceHandle> {
        let spec = service.spec();
        let service_id = spec.id.clone();

        if spec.singleton && self.services.contains_key(&service_id) {
            return Err(ServiceError::AlreadyRunning(service_id));
        }

        let (inbox_tx, command_rx) = mpsc::channel(INBOX_CAPACITY);
        let inbox = ServiceInbox::new(inbox_tx);
        let state = SharedState::new(ServiceState::Starting);
        let handle = ServiceHandle::new(service_id.clone(), inbox.clone(), state.clone());

        let ctx = ServiceContext::new(service_id.clone(), self.publisher(), inbox);
        let channels = ServiceChannels {
            command_rx,
            shutdown_rx: self.shutdown_tx.subscribe(),
            event_rx: self.event_tx.subscribe(),
        };

        let loop_spec = spec.clone();
        let join_handle =
            tokio::spawn(
                async move { run_service_loop(service, ctx, channels, state, loop_spec).await },
            );

        self.services.insert(
            service_id,
            RunningService {
                handle: handle.clone(),
                join_handle,
                spec,
            },
        );

        Ok(handle)
    }

    /// Publish an event; events nobody listens to are dropped silently
    pub fn publish_event(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    pub fn emit(
        &self,
        topic: impl Into<String>,
        source: impl Into<String>,
        payload: serde_json::Value,
    ) {
        self.publish_event(Event::new(topic, source, payload));
    }

    /// Stop one service and wait for its task
    pub async fn stop(&self, service_id: &str) -> ServiceResult<()> {
        let running = self
            .services
            .remove(service_id)
            .map(|(_, v)| v)
            .ok_or_else(|| ServiceError::NotRunning(service_id.to_string()))?;

        let _ = running.handle.shutdown().await;
        join_service(service_id, running).await
    }

    /// Stop every service
    pub async fn shutdown_all(&self) -> ServiceResult<()> {
        tracing::info!(count = self.services.len(), "Shutting down all services");

        let _ = self.shutdown_tx.send(());

        let ids: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        let mut result = Ok(());
        for id in ids {
            if let Some((_, running)) = self.services.remove(&id) {
                if let Err(e) = join_service(&id, running).await {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Ids and states of all registered services
    pub fn list(&self) -> Vec<(String, ServiceState)> {
        self.services
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().handle.state()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

async fn join_service(service_id: &str, running: RunningService) -> ServiceResult<()> {
    // on_stop has its own timeout inside the loop; allow one extra second for the task to unwind
    let timeout = running.spec.shutdown_timeout + Duration::from_secs(1);
    match tokio::time::timeout(timeout, running.join_handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::error!(service_id, error = ?e, "Service task panicked");
            Err(ServiceError::Internal(format!("Task panicked: {:?}", e)))
        }
        Err(_) => {
            tracing::warn!(service_id, "Service shutdown timed out");
            Err(ServiceError::ShutdownTimeout)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Task Loop
// ─────────────────────────────────────────────────────────────────────────────

struct ServiceChannels {
    command_rx: mpsc::Receiver<ServiceCommand>,
    shutdown_rx: broadcast::Receiver<()>,
    event_rx: broadcast::Receiver<Event>,
}

async fn run_service_loop<S: Service>(
    mut service: S,
    ctx: ServiceContext,
    mut channels: ServiceChannels,
    state: SharedState,
    spec: ServiceSpec,
) -> ServiceResult<()> {
    if let Err(e) = service.on_start(&ctx).await {
        tracing::error!(service_id = %ctx.service_id, error = %e, "Service failed to start");
        state.set(ServiceState::Failed);
        return Err(e);
    }

    state.set(ServiceState::Running);
    tracing::info!(service_id = %ctx.service_id, "Service started");

    loop {
        tokio::select! {
            _ = channels.shutdown_rx.recv() => {
                tracing::debug!(service_id = %ctx.service_id, "Received global shutdown signal");
                break;
            }

            cmd = channels.command_rx.recv() => match cmd {
                Some(ServiceCommand::Shutdown) | None => {
                    tracing::debug!(service_id = %ctx.service_id, "Received shutdown command");
                    break;
                }
                Some(ServiceCommand::Event(event)) => {
                    deliver(&mut service, &ctx, event).await;
                }
                Some(ServiceCommand::GetState(tx)) => {
                    let _ = tx.send(state.get());
                }
            },

            received = channels.event_rx.recv() => match received {
                Ok(event) => {
                    if spec.wants(&event.topic) {
                        deliver(&mut service, &ctx, event).await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // the bus keeps no backlog; anything that must not be lost goes through the inbox
                    tracing::error!(service_id = %ctx.service_id, skipped, "Service lagged behind the bus; events lost");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    state.set(ServiceState::Stopping);
    tracing::debug!(service_id = %ctx.service_id, "Service stopping");

    match tokio::time::timeout(spec.shutdown_timeout, service.on_stop(&ctx)).await {
        Ok(Ok(())) => {
            state.set(ServiceState::Stopped);
            tracing::info!(service_id = %ctx.service_id, "Service stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            state.set(ServiceState::Failed);
            tracing::error!(service_id = %ctx.service_id, error = %e, "Service stop failed");
            Err(e)
        }
        Err(_) => {
            state.set(ServiceState::Failed);
            tracing::error!(service_id = %ctx.service_id, "Service stop timed out");
            Err(ServiceError::ShutdownTimeout)
        }
    }
}

async fn deliver<S: Service>(service: &mut S, ctx: &ServiceContext, event: Event) {
    let topic = event.topic.clone();
    if let Err(e) = service.on_event(ctx, event).await {
        tracing::warn!(service_id = %ctx.service_id, topic = %topic, error = %e, "Error handling event");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
