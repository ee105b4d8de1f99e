//! Notification publisher
//!
//! Wraps each outcome of the display core into a notification record and
//! puts it on the bus.

use std::net::UdpSocket;

use bus_runtime::{Event, EventPublisher};
use chrono::Local;
use sysinfo::System;
use tokio::sync::watch;
use tracing::{trace, warn};

use crate::config::PlayerConfig;
use crate::device::{Notification, NotificationSink};

use super::record::{NotificationRecord, format_time};

/// What this machine reports about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub host_name: String,
    pub ip: Option<String>,
}

impl HostInfo {
    /// Best-effort detection; never fails
    pub fn detect() -> Self {
        let host_name = System::host_name()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            host_name,
            ip: local_ip(),
        }
    }
}

/// Address of the interface that routes outwards. No packet is sent.
fn local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

/// Publishes core outcomes as notification records
pub struct BusNotifier {
    bus: EventPublisher,
    topic: String,
    source: String,
    identity: watch::Receiver<PlayerConfig>,
    host: HostInfo,
}

impl BusNotifier {
    pub fn new(
        bus: EventPublisher,
        topic: impl Into<String>,
        source: impl Into<String>,
        identity: watch::Receiver<PlayerConfig>,
        host: HostInfo,
    ) -> Self {
        Self {
            bus,
            topic: topic.into(),
            source: source.into(),
            identity,
            host,
        }
    }

    /// Build the outbound record for `notification` with the current identity
    pub fn record(&self, notification: Notification) -> NotificationRecord {
        let player = self.identity.borrow();
        NotificationRecord {
            uuid: notification.id,
            group: notification.group,
            msg: notification.message,
            time: format_time(&Local::now()),
            player_id: player.player_id.clone(),
            last_known_player_id: self.host.host_name.clone(),
            fixed_ip: player.fixed_ip.clone(),
            last_known_ip: self.host.ip.clone(),
            hall: player.hall.clone(),
            location: player.location.clone(),
        }
    }
}

impl NotificationSink for BusNotifier {
    fn publish(&self, notification: Notification) {
        let record = self.record(notification);
        let event = match Event::with_payload(&self.topic, &self.source, &record) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Failed to serialize notification");
                return;
            }
        };
        match self.bus.publish(event) {
            Ok(receivers) => trace!(topic = %self.topic, receivers, "Notification published"),
            Err(_) => warn!(topic = %self.topic, uuid = ?record.uuid, "Notification dropped; nobody is listening"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::broadcast;

    fn player(id: &str) -> PlayerConfig {
        PlayerConfig {
            player_id: id.into(),
            hall: "A".into(),
            location: "L1".into(),
            fixed_ip: Some("10.0.0.5".into()),
        }
    }

    fn host() -> HostInfo {
        HostInfo {
            host_name: "kiosk-3".into(),
            ip: Some("192.168.1.20".into()),
        }
    }

    #[test]
    fn test_publishes_record_on_topic() {
        let (tx, mut rx) = broadcast::channel(8);
        let (_identity_tx, identity) = watch::channel(player("mp-7"));
        let notifier = BusNotifier::new(EventPublisher::new(tx), "/topic/notifications", "display", identity, host());

        notifier.publish(Notification::new(22, 3, Some("u1".into())));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.topic, "/topic/notifications");
        let record: NotificationRecord = event.parse_payload().unwrap();
        assert_eq!(record.uuid.as_deref(), Some("u1"));
        assert_eq!(record.group, 3);
        assert_eq!(record.msg, json!(22));
        assert_eq!(record.player_id, "mp-7");
        assert_eq!(record.last_known_player_id, "kiosk-3");
        assert_eq!(record.last_known_ip.as_deref(), Some("192.168.1.20"));
        assert_eq!(record.fixed_ip.as_deref(), Some("10.0.0.5"));
        assert!(!record.time.is_empty());
    }

    #[test]
    fn test_record_follows_identity_updates() {
        let (tx, _rx) = broadcast::channel(8);
        let (identity_tx, identity) = watch::channel(player("mp-7"));
        let notifier = BusNotifier::new(EventPublisher::new(tx), "n", "display", identity, host());

        identity_tx.send(player("mp-9")).unwrap();

        let record = notifier.record(Notification::new("No response", 2, None));
        assert_eq!(record.player_id, "mp-9");
        assert_eq!(record.uuid, None);
    }

    #[test]
    fn test_publish_without_listeners_does_not_panic() {
        let (tx, rx) = broadcast::channel(8);
        drop(rx);
        let (_identity_tx, identity) = watch::channel(player("mp-7"));
        let notifier = BusNotifier::new(EventPublisher::new(tx), "n", "display", identity, host());

        notifier.publish(Notification::new("No response", 2, None));
    }

    #[test]
    fn test_detect_host() {
        let host = HostInfo::detect();
        assert!(!host.host_name.is_empty());
        if let Some(name) = System::host_name().filter(|name| !name.trim().is_empty()) {
            assert_eq!(host.host_name, name.trim());
        }
    }
}
