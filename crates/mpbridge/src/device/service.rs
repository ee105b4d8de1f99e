//! Display Service
//!
//! The bus-facing owner of the bridge engine. Commands arrive from the bus,
//! serial frames through the service's inbox, and both are handled one at a
//! time by this service's task, so the command queue has a single writer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bus_runtime::{Event, EventPublisher, Service, ServiceContext, ServiceError, ServiceResult, ServiceSpec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::bus::{BusNotifier, CommandRecord, HostInfo, Route, route};
use crate::codes::CodeTables;
use crate::config::{BridgeConfig, BusConfig, PlayerConfig, StartupConfig};

use super::codec::FrameCodec;
use super::dispatcher::{CommandSink, DispatchOutcome};
use super::engine::Bridge;
use super::link::{LinkWriter, SerialConfig, SerialLink};
use super::{FRAME_TOPIC, READY_TOPIC};

pub const SERVICE_ID: &str = "display";

/// Any byte stream that can stand in for the serial port
pub trait DeviceIo: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

impl<T> DeviceIo for T where T: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

enum Endpoint {
    Serial(SerialConfig),
    Stream(Box<dyn DeviceIo>),
}

pub struct DisplayService {
    bus: BusConfig,
    startup: StartupConfig,
    codec: FrameCodec,
    endpoint: Option<Endpoint>,
    bridge: Bridge,
    identity: watch::Receiver<PlayerConfig>,
    host: HostInfo,

    // Set while running
    link: Option<SerialLink>,
    writer: Option<LinkWriter>,
    notifier: Option<BusNotifier>,
    warmup: Option<JoinHandle<()>>,
}

impl DisplayService {
    pub fn new(config: &BridgeConfig, tables: Arc<CodeTables>, identity: watch::Receiver<PlayerConfig>) -> Self {
        Self {
            bus: config.bus.clone(),
            startup: config.startup.clone(),
            codec: config.serial.codec(),
            endpoint: Some(Endpoint::Serial(config.serial.clone())),
            bridge: Bridge::new(tables),
            identity,
            host: HostInfo::detect(),
            link: None,
            writer: None,
            notifier: None,
            warmup: None,
        }
    }

    /// Talk to `io` instead of opening the configured port
    pub fn with_stream(mut self, io: impl DeviceIo) -> Self {
        self.endpoint = Some(Endpoint::Stream(Box::new(io)));
        self
    }

    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = host;
        self
    }

    fn open_link(&mut self, ctx: &ServiceContext) -> ServiceResult<SerialLink> {
        let endpoint = self
            .endpoint
            .take()
            .ok_or_else(|| ServiceError::InitializationFailed("serial endpoint already used".into()))?;

        let link = match endpoint {
            Endpoint::Serial(config) => {
                let stream = config.open().map_err(|e| {
                    ServiceError::InitializationFailed(format!("cannot open {}: {}", config.port, e))
                })?;
                SerialLink::spawn(stream, self.codec.clone(), ctx.inbox(), ctx.service_id.clone())
            }
            Endpoint::Stream(io) => {
                SerialLink::spawn(io, self.codec.clone(), ctx.inbox(), ctx.service_id.clone())
            }
        };
        Ok(link)
    }

    fn power_on(&self, writer: &mut LinkWriter) {
        let Some(command) = self.startup.command.as_deref().filter(|c| !c.trim().is_empty()) else {
            return;
        };
        let line = if command.ends_with("\r\n") {
            command.to_string()
        } else {
            format!("{}\r\n", command)
        };
        match writer.send_line(&line) {
            Ok(()) => info!(command = %command, "Power-on command written"),
            Err(e) => warn!(command = %command, error = %e, "Failed to write power-on command"),
        }
    }

    fn on_frame(&mut self, event: &Event) -> ServiceResult<()> {
        let Some(frame) = event.get_str("frame") else {
            warn!("Frame event without frame text");
            return Ok(());
        };
        let notifier = self
            .notifier
            .as_ref()
            .ok_or_else(|| ServiceError::NotRunning(SERVICE_ID.into()))?;

        let (decoded, correlation) = self.bridge.handle_frame(frame, notifier);
        debug!(
            frame = %decoded.raw,
            group = decoded.group,
            extra = decoded.extra.as_deref(),
            drained = correlation.drained.len(),
            pending = self.bridge.queue().len(),
            "Reply handled"
        );
        Ok(())
    }

    fn on_command(&mut self, ctx: &ServiceContext, event: Event) -> ServiceResult<()> {
        let record: CommandRecord = match event.parse_payload() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Dropping malformed command record");
                return Ok(());
            }
        };

        let route = route(&record, &self.identity.borrow());
        match route {
            Route::Ignore => {
                trace!(command = %record.msg, "Command addressed to another player");
                Ok(())
            }
            Route::Settings => {
                info!(command = %record.msg, topic = %self.bus.settings_topic, "Forwarding settings command");
                ctx.emit(self.bus.settings_topic.clone(), event.payload)
            }
            Route::Display => {
                let (Some(writer), Some(notifier)) = (self.writer.as_mut(), self.notifier.as_ref()) else {
                    return Err(ServiceError::NotRunning(SERVICE_ID.into()));
                };
                let outcome = self
                    .bridge
                    .submit(&record.msg, record.param, record.uuid, writer, notifier);
                if let DispatchOutcome::Sent(_) = outcome {
                    trace!(pending = self.bridge.queue().len(), "Command queued");
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Service for DisplayService {
    fn spec(&self) -> ServiceSpec {
        ServiceSpec::new(SERVICE_ID, "Display Bridge")
            .subscribe(self.bus.command_topic.clone())
            .singleton(true)
            .with_description("Queues bus commands for the display and correlates its replies")
    }

    async fn on_start(&mut self, ctx: &ServiceContext) -> ServiceResult<()> {
        let link = self.open_link(ctx)?;
        let mut writer = link.writer();
        self.power_on(&mut writer);

        self.notifier = Some(BusNotifier::new(
            ctx.publisher(),
            self.bus.notifications_topic.clone(),
            ctx.service_id.clone(),
            self.identity.clone(),
            self.host.clone(),
        ));
        self.warmup = Some(spawn_warmup(
            ctx.publisher(),
            ctx.service_id.clone(),
            Duration::from_secs(self.startup.warmup_secs),
        ));
        self.writer = Some(writer);
        self.link = Some(link);

        info!(
            commands = %self.bus.command_topic,
            notifications = %self.bus.notifications_topic,
            "Display bridge running"
        );
        Ok(())
    }

    async fn on_stop(&mut self, _ctx: &ServiceContext) -> ServiceResult<()> {
        if let Some(task) = self.warmup.take() {
            task.abort();
        }
        self.writer = None;
        self.notifier = None;
        if let Some(link) = self.link.take() {
            link.close();
        }

        let queue = self.bridge.queue();
        if !queue.is_empty() {
            warn!(pending = queue.len(), "Unanswered commands discarded");
        }
        let stats = queue.stats();
        info!(
            enqueued = stats.enqueued,
            matched = stats.matched,
            drained = stats.drained,
            rejected = stats.rejected,
            "Display bridge stopped"
        );
        Ok(())
    }

    async fn on_event(&mut self, ctx: &ServiceContext, event: Event) -> ServiceResult<()> {
        if event.topic == FRAME_TOPIC {
            self.on_frame(&event)
        } else if event.topic == self.bus.command_topic {
            self.on_command(ctx, event)
        } else {
            Ok(())
        }
    }
}

/// Announce readiness once the display has had time to power up
fn spawn_warmup(bus: EventPublisher, source: String, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        info!(secs = delay.as_secs(), "Display warm-up finished");
        if bus.emit(READY_TOPIC, source, serde_json::Value::Null).is_err() {
            debug!("Nobody waiting for display readiness");
        }
    })
}
