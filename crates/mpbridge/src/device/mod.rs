//! Display device
//!
//! The command queue and reply correlation engine, the serial link that
//! carries its traffic, and the service that ties both to the bus.

mod codec;
mod correlator;
mod decoder;
mod dispatcher;
mod engine;
mod link;
mod queue;
mod service;
mod types;

pub use codec::{DEFAULT_DELIMITER, DEFAULT_MAX_FRAME_LEN, FrameCodec};
pub use correlator::{Correlation, correlate};
pub use decoder::{DecodeMatch, DecodedFrame, classify, decode_frame};
pub use dispatcher::{CommandSink, DispatchOutcome, dispatch, encode_line};
pub use engine::Bridge;
pub use link::{FlowControl, LinkWriter, Parity, SerialConfig, SerialLink, TransportError};
pub use queue::{CommandQueue, QueueStats, QueuedCommand, Removal};
pub use service::{DeviceIo, DisplayService, SERVICE_ID};
pub use types::{NO_RESPONSE, Notification, NotificationSink, Param, UNKNOWN_COMMAND};

/// Topic of serial frame events handed to the display service's inbox
pub const FRAME_TOPIC: &str = "display/frame";

/// Emitted once the display has finished warming up
pub const READY_TOPIC: &str = "display/ready";
