//! Bridge Engine
//!
//! Owns the command queue and the code tables. Every command and every frame
//! goes through one `Bridge`, so queue updates are strictly ordered.

use std::sync::Arc;

use crate::codes::CodeTables;

use super::correlator::{Correlation, correlate};
use super::decoder::{DecodedFrame, decode_frame};
use super::dispatcher::{CommandSink, DispatchOutcome, dispatch};
use super::queue::CommandQueue;
use super::types::{NotificationSink, Param};

pub struct Bridge {
    tables: Arc<CodeTables>,
    queue: CommandQueue,
}

impl Bridge {
    pub fn new(tables: Arc<CodeTables>) -> Self {
        Self {
            tables,
            queue: CommandQueue::new(),
        }
    }

    /// Queue a command and write it to the display
    pub fn submit(
        &mut self,
        name: &str,
        param: Option<Param>,
        id: Option<String>,
        sink: &mut dyn CommandSink,
        notifier: &dyn NotificationSink,
    ) -> DispatchOutcome {
        self.queue.enqueue(name, param.clone(), id);
        dispatch(&self.tables, &mut self.queue, name, param.as_ref(), sink, notifier)
    }

    /// Decode a frame and settle the queue against it
    pub fn handle_frame(&mut self, frame: &str, notifier: &dyn NotificationSink) -> (DecodedFrame, Correlation) {
        let decoded = decode_frame(&self.tables, frame);
        let correlation = correlate(&self.tables, &mut self.queue, &decoded, notifier);
        (decoded, correlation)
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }
}
