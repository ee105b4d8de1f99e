//! Configuration Loader
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults
//! 2. The TOML file
//! 3. `MPBRIDGE_` environment variables, `__` separating sections
//!    (e.g. `MPBRIDGE_PLAYER__PLAYER_ID=mp-7`)

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::info;

use super::settings::BridgeConfig;

pub const ENV_PREFIX: &str = "MPBRIDGE_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Extract(#[from] figment::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate the configuration at `path`.
    ///
    /// Relative table paths are resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<BridgeConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let mut config: BridgeConfig = Self::figment(path).extract()?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.tables = config.tables.relative_to(base);

        Self::validate(&config)?;
        info!(
            path = %path.display(),
            player_id = %config.player.player_id,
            port = %config.serial.port,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(BridgeConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn validate(config: &BridgeConfig) -> Result<(), ConfigError> {
        if config.player.player_id.trim().is_empty() {
            return Err(ConfigError::Invalid("player.player_id must not be empty".into()));
        }
        let topics = [
            ("bus.command_topic", &config.bus.command_topic),
            ("bus.notifications_topic", &config.bus.notifications_topic),
            ("bus.settings_topic", &config.bus.settings_topic),
        ];
        for (key, topic) in topics {
            if topic.is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", key)));
            }
        }
        if config.bus.command_topic == config.bus.notifications_topic {
            return Err(ConfigError::Invalid(
                "command and notification topics must differ".into(),
            ));
        }
        config
            .serial
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Parity;

    const SAMPLE: &str = r#"
        [player]
        player_id = "mp-7"
        hall = "A"
        location = "L1"

        [serial]
        port = "/dev/ttyS3"
        parity = "even"

        [startup]
        warmup_secs = 2
    "#;

    #[test]
    fn test_load_layers_file_over_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("mpbridge.toml", SAMPLE)?;

            let config = ConfigLoader::load("mpbridge.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.player.player_id, "mp-7");
            assert_eq!(config.serial.port, "/dev/ttyS3");
            assert_eq!(config.serial.parity, Parity::Even);
            assert_eq!(config.serial.baud_rate, 9600);
            assert_eq!(config.startup.warmup_secs, 2);
            assert_eq!(config.startup.command.as_deref(), Some("ka 01 01"));
            assert_eq!(config.bus.notifications_topic, "/topic/notifications");
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("mpbridge.toml", SAMPLE)?;
            jail.set_env("MPBRIDGE_PLAYER__HALL", "B");
            jail.set_env("MPBRIDGE_SERIAL__BAUD_RATE", "19200");

            let config = ConfigLoader::load("mpbridge.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.player.hall, "B");
            assert_eq!(config.serial.baud_rate, 19200);
            Ok(())
        });
    }

    #[test]
    fn test_tables_resolved_next_to_config() {
        figment::Jail::expect_with(|jail| {
            std::fs::create_dir(jail.directory().join("site")).map_err(|e| e.to_string())?;
            jail.create_file("site/mpbridge.toml", "[player]\nplayer_id = \"mp-1\"\n")?;

            let config = ConfigLoader::load("site/mpbridge.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.tables.commands, PathBuf::from("site/tables/commands.json"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        figment::Jail::expect_with(|_| {
            let err = ConfigLoader::load("absent.toml").unwrap_err();
            assert!(matches!(err, ConfigError::NotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("empty_id.toml", "[player]\nplayer_id = \"\"\n")?;
            jail.create_file("bits.toml", "[serial]\ndata_bits = 9\n")?;
            jail.create_file("baud.toml", "[serial]\nbaud_rate = \"fast\"\n")?;

            assert!(matches!(ConfigLoader::load("empty_id.toml"), Err(ConfigError::Invalid(_))));
            assert!(matches!(ConfigLoader::load("bits.toml"), Err(ConfigError::Invalid(_))));
            assert!(matches!(ConfigLoader::load("baud.toml"), Err(ConfigError::Extract(_))));
            Ok(())
        });
    }
}
