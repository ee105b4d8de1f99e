//! The shipped sample configuration must load and be self-consistent.

use std::path::PathBuf;

use mpbridge::codes::{CodeTables, ParamFormat};
use mpbridge::config::ConfigLoader;
use mpbridge::device::{Parity, decode_frame};

fn sample_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/mpbridge.toml")
}

#[tokio::test]
async fn test_sample_config_loads() {
    let config = ConfigLoader::load(sample_path()).unwrap();
    assert_eq!(config.serial.baud_rate, 9600);
    assert_eq!(config.serial.parity, Parity::None);
    assert_eq!(config.serial.delimiter, 'x');
    assert_eq!(config.startup.command.as_deref(), Some("ka 01 01"));
    assert!(config.tables.commands.ends_with("tables/commands.json"));

    let tables = CodeTables::load(&config.tables).await.unwrap();
    assert_eq!(tables.encode("set_volume").unwrap().param, ParamFormat::Hex);
}

#[tokio::test]
async fn test_every_sample_command_has_a_reply_group() {
    let config = ConfigLoader::load(sample_path()).unwrap();
    let tables = CodeTables::load(&config.tables).await.unwrap();

    for name in tables.command_names() {
        assert!(tables.expected_group(name).is_some(), "{} has no group", name);
    }
}

#[tokio::test]
async fn test_sample_replies_decode() {
    let config = ConfigLoader::load(sample_path()).unwrap();
    let tables = CodeTables::load(&config.tables).await.unwrap();

    let power = decode_frame(&tables, "a 01 OK01");
    assert_eq!(power.value, serde_json::json!("on"));
    assert_eq!(Some(power.group), tables.expected_group("open"));

    let volume = decode_frame(&tables, "f 01 OK1E");
    assert_eq!(volume.extra.as_deref(), Some("Volume: 30"));
    assert_eq!(Some(volume.group), tables.expected_group("set_volume"));

    let serial = decode_frame(&tables, "y 01 OK405KCAB12345");
    assert_eq!(serial.extra.as_deref(), Some("Serial number: 405KCAB12345"));
    assert_eq!(Some(serial.group), tables.expected_group("serial_number"));
}
