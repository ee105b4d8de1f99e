//! Command Dispatcher
//!
//! Encodes a named command and writes it to the serial link.

use crate::codes::{CodeTables, EncodeEntry, UNKNOWN_GROUP};

use super::link::TransportError;
use super::queue::{CommandQueue, QueuedCommand, Removal};
use super::types::{Notification, NotificationSink, Param, UNKNOWN_COMMAND};

const LINE_END: &str = "\r\n";

/// Write side of the serial link
pub trait CommandSink {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError>;
}

/// What happened to a dispatched command
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Line handed to the link
    Sent(String),
    /// No template; the oldest queued command was dropped in its place
    Unknown { evicted: Option<QueuedCommand> },
    /// The link refused the line; the command stays queued
    WriteFailed(TransportError),
}

/// Build the wire line for a command.
///
/// With a parameter the line is `template + param + CRLF`. Without one the
/// template is written exactly as stored, so tables carry their own line end.
pub fn encode_line(entry: &EncodeEntry, param: Option<&Param>) -> String {
    match param.filter(|p| !p.is_placeholder()) {
        Some(param) => format!("{}{}{}", entry.template, param.render(entry.param), LINE_END),
        None => entry.template.clone(),
    }
}

/// Encode and write `name`.
///
/// An unknown name publishes "Unknown command" for the head of the queue and
/// removes that head.
pub fn dispatch(
    tables: &CodeTables,
    queue: &mut CommandQueue,
    name: &str,
    param: Option<&Param>,
    sink: &mut dyn CommandSink,
    notifier: &dyn NotificationSink,
) -> DispatchOutcome {
    let Some(entry) = tables.encode(name) else {
        let evicted = queue.remove_front(Removal::EncodingFailure);
        tracing::warn!(
            command = %name,
            evicted = evicted.as_ref().map(|c| c.name.as_str()),
            "Unknown command"
        );
        notifier.publish(Notification::new(
            UNKNOWN_COMMAND,
            UNKNOWN_GROUP,
            evicted.as_ref().and_then(|c| c.id.clone()),
        ));
        return DispatchOutcome::Unknown { evicted };
    };

    let line = encode_line(entry, param);
    match sink.send_line(&line) {
        Ok(()) => {
            tracing::debug!(command = %name, line = %line.trim_end(), "Command written");
            DispatchOutcome::Sent(line)
        }
        Err(e) => {
            tracing::error!(command = %name, error = %e, "Failed to write command");
            DispatchOutcome::WriteFailed(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Sink that keeps every line, or refuses them all
    #[derive(Default)]
    pub(crate) struct LineRecorder {
        pub(crate) lines: Vec<String>,
        pub(crate) refuse: bool,
    }

    impl CommandSink for LineRecorder {
        fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
            if self.refuse {
                return Err(TransportError::Closed);
            }
            self.lines.push(line.to_string());
            Ok(())
        }
    }
}
