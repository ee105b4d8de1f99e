//! Bus side of the bridge: record formats, routing, the notification
//! publisher and the stdio adapter.

mod publisher;
mod record;
mod routing;
pub mod stdio;

pub use publisher::{BusNotifier, HostInfo};
pub use record::{CommandRecord, NotificationRecord, PlayerAddress, format_time};
pub use routing::{Route, SETTINGS_COMMANDS, addressed_to, route};
pub use stdio::StdioBus;
