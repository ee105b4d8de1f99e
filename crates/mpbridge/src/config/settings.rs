//! Bridge Configuration Types

use serde::{Deserialize, Serialize};

use crate::codes::TableFiles;
use crate::device::SerialConfig;

/// Root configuration (`mpbridge.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub player: PlayerConfig,
    pub bus: BusConfig,
    pub serial: SerialConfig,
    pub startup: StartupConfig,
    pub tables: TableFiles,
}

/// Identity of this media player, used for routing and notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub player_id: String,
    pub hall: String,
    pub location: String,
    /// Address assigned by the operator, reported as-is
    pub fixed_ip: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            player_id: "player".to_string(),
            hall: String::new(),
            location: String::new(),
            fixed_ip: None,
        }
    }
}

/// Bus topics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Inbound command records
    pub command_topic: String,
    /// Outbound notification records
    pub notifications_topic: String,
    /// Settings commands forwarded unchanged
    pub settings_topic: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            command_topic: "/topic/command".to_string(),
            notifications_topic: "/topic/notifications".to_string(),
            settings_topic: "/topic/settings".to_string(),
        }
    }
}

/// Power-on sequence run when the display service starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Raw line written before anything else; not queued
    pub command: Option<String>,
    /// Seconds the display needs before it answers reliably
    pub warmup_secs: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            command: Some("ka 01 01".to_string()),
            warmup_secs: 10,
        }
    }
}
