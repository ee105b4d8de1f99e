//! Display core types

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codes::{GroupId, ParamFormat};

/// Message published for a queued command that got no matching reply
pub const NO_RESPONSE: &str = "No response";

/// Message published when a command name has no wire template
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// Scalar parameter attached to a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Number(serde_json::Number),
    Bool(bool),
    Text(String),
}

impl Param {
    /// The string `"null"` stands for "no parameter" on the bus
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Param::Text(text) if text == "null")
    }

    /// Render the parameter as a wire suffix
    pub fn render(&self, format: ParamFormat) -> String {
        match (format, self) {
            (ParamFormat::Hex, Param::Number(n)) => match n.as_u64() {
                Some(v) => format!("{:02X}", v),
                None => n.to_string(),
            },
            (ParamFormat::Hex, Param::Bool(b)) => format!("{:02X}", u8::from(*b)),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Number(n) => write!(f, "{}", n),
            Param::Bool(b) => write!(f, "{}", b),
            Param::Text(s) => f.write_str(s),
        }
    }
}

/// Outcome published towards the bus: `(message, group, id)`
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub message: Value,
    pub group: GroupId,
    pub id: Option<String>,
}

impl Notification {
    pub fn new(message: impl Into<Value>, group: GroupId, id: Option<String>) -> Self {
        Self {
            message: message.into(),
            group,
            id,
        }
    }
}

/// Receiver of every outcome the core produces.
///
/// Delivery failures are the implementor's concern; the core never retries.
pub trait NotificationSink {
    fn publish(&self, notification: Notification);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::*;

    /// Sink that keeps every notification for assertions
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        published: RefCell<Vec<Notification>>,
    }

    impl RecordingSink {
        pub(crate) fn take(&self) -> Vec<Notification> {
            self.published.take()
        }
    }

    impl NotificationSink for RecordingSink {
        fn publish(&self, notification: Notification) {
            self.published.borrow_mut().push(notification);
        }
    }
}
