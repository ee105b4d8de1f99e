//! Response Correlator
//!
//! Matches a decoded reply to the oldest queued command expecting its group.
//! Commands ahead of that one never got their reply and are drained with
//! "No response".

use crate::codes::CodeTables;

use super::decoder::DecodedFrame;
use super::queue::{CommandQueue, QueuedCommand, Removal};
use super::types::{NO_RESPONSE, Notification, NotificationSink};

/// Result of correlating one frame
#[derive(Debug, Default, PartialEq)]
pub struct Correlation {
    /// Commands dropped ahead of the match, oldest first
    pub drained: Vec<QueuedCommand>,
    pub matched: Option<QueuedCommand>,
    /// The queue was empty when the frame arrived
    pub unsolicited: bool,
}

pub fn correlate(
    tables: &CodeTables,
    queue: &mut CommandQueue,
    frame: &DecodedFrame,
    notifier: &dyn NotificationSink,
) -> Correlation {
    let mut outcome = Correlation::default();

    if queue.is_empty() {
        tracing::debug!(frame = %frame.raw, group = frame.group, "Unsolicited reply");
        notifier.publish(Notification::new(frame.value.clone(), frame.group, None));
        outcome.unsolicited = true;
        return outcome;
    }

    while let Some(head) = queue.front() {
        if tables.expected_group(&head.name) == Some(frame.group) {
            break;
        }
        notifier.publish(Notification::new(NO_RESPONSE, frame.group, head.id.clone()));
        if let Some(drained) = queue.remove_front(Removal::Drained) {
            tracing::warn!(command = %drained.name, seq = drained.seq, "No response from display");
            outcome.drained.push(drained);
        }
    }

    match queue.remove_front(Removal::Matched) {
        Some(matched) => {
            tracing::debug!(
                command = %matched.name,
                frame = %frame.raw,
                group = frame.group,
                "Reply matched"
            );
            notifier.publish(Notification::new(
                frame.value.clone(),
                frame.group,
                matched.id.clone(),
            ));
            outcome.matched = Some(matched);
        }
        None => {
            tracing::debug!(frame = %frame.raw, group = frame.group, "Reply matched no queued command");
            notifier.publish(Notification::new(NO_RESPONSE, frame.group, None));
        }
    }

    outcome
}
