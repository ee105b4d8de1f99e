//! Command Queue
//!
//! Commands waiting for a reply, in the order they arrived from the bus.
//! Entries are appended at the back and only ever removed from the front.

use std::collections::VecDeque;

use super::types::Param;

/// A command sent (or about to be sent) to the display
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    pub name: String,
    pub param: Option<Param>,
    /// Correlation token from the bus record
    pub id: Option<String>,
    /// Position in arrival order
    pub seq: u64,
}

/// Why a command left the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// A reply of the expected group arrived
    Matched,
    /// A later reply of another group arrived first
    Drained,
    /// The command name had no wire template
    EncodingFailure,
}

/// Counters over the queue's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub matched: u64,
    pub drained: u64,
    pub rejected: u64,
}

impl QueueStats {
    pub fn removed(&self) -> u64 {
        self.matched + self.drained + self.rejected
    }
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<QueuedCommand>,
    next_seq: u64,
    stats: QueueStats,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command, returning its sequence number
    pub fn enqueue(&mut self, name: impl Into<String>, param: Option<Param>, id: Option<String>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.stats.enqueued += 1;
        self.pending.push_back(QueuedCommand {
            name: name.into(),
            param,
            id,
            seq,
        });
        seq
    }

    /// Oldest pending command
    pub fn front(&self) -> Option<&QueuedCommand> {
        self.pending.front()
    }

    /// Remove the oldest command, recording why
    pub fn remove_front(&mut self, reason: Removal) -> Option<QueuedCommand> {
        let removed = self.pending.pop_front()?;
        match reason {
            Removal::Matched => self.stats.matched += 1,
            Removal::Drained => self.stats.drained += 1,
            Removal::EncodingFailure => self.stats.rejected += 1,
        }
        tracing::trace!(seq = removed.seq, command = %removed.name, ?reason, "Command left the queue");
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedCommand> {
        self.pending.iter()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}
