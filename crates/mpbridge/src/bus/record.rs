//! Bus record formats

use std::fmt::Display;

use chrono::{DateTime, Datelike, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codes::GroupId;
use crate::device::Param;

/// Players a command is addressed to; `"all"` is a wildcard per field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAddress {
    pub player_id: String,
    #[serde(default)]
    pub hall: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Inbound command record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    /// Command name
    pub msg: String,
    #[serde(default)]
    pub param: Option<Param>,
    #[serde(default)]
    pub mp: Option<PlayerAddress>,
    /// Correlation token echoed in the notification
    #[serde(default)]
    pub uuid: Option<String>,
}

/// Outbound notification record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub uuid: Option<String>,
    pub group: GroupId,
    pub msg: Value,
    pub time: String,
    pub player_id: String,
    pub last_known_player_id: String,
    pub fixed_ip: Option<String>,
    pub last_known_ip: Option<String>,
    pub hall: String,
    pub location: String,
}

/// Timestamp like `16th October 2026, 3:04:05 pm`
pub fn format_time<Tz>(time: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let day = time.day();
    format!(
        "{}{} {}",
        day,
        ordinal_suffix(day),
        time.format("%B %Y, %-I:%M:%S %P")
    )
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_command_record_fields() {
        let record: CommandRecord = serde_json::from_value(json!({
            "msg": "set_volume",
            "param": 30,
            "mp": { "player_id": "all", "hall": "A", "location": "all" },
            "uuid": "123e4567"
        }))
        .unwrap();

        assert_eq!(record.msg, "set_volume");
        assert_eq!(record.param, Some(Param::Number(30.into())));
        assert_eq!(record.uuid.as_deref(), Some("123e4567"));
        assert_eq!(record.mp.unwrap().hall.as_deref(), Some("A"));
    }

    #[test]
    fn test_minimal_command_record() {
        let record: CommandRecord = serde_json::from_value(json!({ "msg": "temp", "param": null })).unwrap();
        assert_eq!(record.param, None);
        assert_eq!(record.mp, None);
        assert_eq!(record.uuid, None);

        assert!(serde_json::from_value::<CommandRecord>(json!({ "param": 1 })).is_err());
    }

    #[test]
    fn test_notification_record_shape() {
        let record = NotificationRecord {
            uuid: None,
            group: 3,
            msg: json!(22),
            time: "1st January 2026, 9:00:00 am".into(),
            player_id: "mp-1".into(),
            last_known_player_id: "host".into(),
            fixed_ip: Some("10.0.0.5".into()),
            last_known_ip: None,
            hall: "A".into(),
            location: "L1".into(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["uuid"], Value::Null);
        assert_eq!(value["msg"], json!(22));
        assert_eq!(value["fixed_ip"], json!("10.0.0.5"));
    }

    #[test]
    fn test_format_time() {
        let afternoon = Utc.with_ymd_and_hms(2026, 10, 16, 15, 4, 5).unwrap();
        assert_eq!(format_time(&afternoon), "16th October 2026, 3:04:05 pm");

        let morning = Utc.with_ymd_and_hms(2026, 3, 1, 0, 30, 0).unwrap();
        assert_eq!(format_time(&morning), "1st March 2026, 12:30:00 am");
    }

    #[test]
    fn test_ordinal_suffix() {
        let cases = [(1, "st"), (2, "nd"), (3, "rd"), (4, "th"), (11, "th"), (12, "th"), (13, "th"), (21, "st"), (22, "nd"), (23, "rd"), (31, "st")];
        for (day, suffix) in cases {
            assert_eq!(ordinal_suffix(day), suffix, "day {}", day);
        }
    }
}
