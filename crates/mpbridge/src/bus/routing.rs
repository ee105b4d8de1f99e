//! Command routing
//!
//! Decides whether an inbound record is meant for this player and whether
//! the display or the settings collaborator handles it.

use crate::config::PlayerConfig;

use super::record::{CommandRecord, PlayerAddress};

const WILDCARD: &str = "all";

/// Commands handled outside the display queue
pub const SETTINGS_COMMANDS: &[&str] = &["change_settings", "change_server"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Queue and write to the display
    Display,
    /// Forward to the settings topic
    Settings,
    /// Not for this player
    Ignore,
}

pub fn route(record: &CommandRecord, player: &PlayerConfig) -> Route {
    let Some(address) = &record.mp else {
        return Route::Ignore;
    };
    if !addressed_to(address, player) {
        return Route::Ignore;
    }
    if SETTINGS_COMMANDS.contains(&record.msg.as_str()) {
        Route::Settings
    } else {
        Route::Display
    }
}

/// A player is addressed by its own id, or by `"all"` with matching (or
/// wildcard) hall and location.
pub fn addressed_to(address: &PlayerAddress, player: &PlayerConfig) -> bool {
    if address.player_id == player.player_id {
        return true;
    }
    address.player_id == WILDCARD
        && field_matches(address.hall.as_deref(), &player.hall)
        && field_matches(address.location.as_deref(), &player.location)
}

fn field_matches(wanted: Option<&str>, own: &str) -> bool {
    matches!(wanted, Some(w) if w == WILDCARD || w == own)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> PlayerConfig {
        PlayerConfig {
            player_id: "mp-7".into(),
            hall: "A".into(),
            location: "L1".into(),
            fixed_ip: None,
        }
    }

    fn address(player_id: &str, hall: Option<&str>, location: Option<&str>) -> PlayerAddress {
        PlayerAddress {
            player_id: player_id.into(),
            hall: hall.map(Into::into),
            location: location.map(Into::into),
        }
    }

    fn record(msg: &str, mp: Option<PlayerAddress>) -> CommandRecord {
        CommandRecord {
            msg: msg.into(),
            param: None,
            mp,
            uuid: None,
        }
    }

    #[test]
    fn test_own_player_id() {
        assert!(addressed_to(&address("mp-7", None, None), &player()));
        assert!(!addressed_to(&address("mp-8", Some("all"), Some("all")), &player()));
    }

    #[test]
    fn test_wildcards_per_field() {
        let me = player();
        assert!(addressed_to(&address("all", Some("all"), Some("all")), &me));
        assert!(addressed_to(&address("all", Some("A"), Some("all")), &me));
        assert!(addressed_to(&address("all", Some("all"), Some("L1")), &me));
        assert!(addressed_to(&address("all", Some("A"), Some("L1")), &me));
        assert!(!addressed_to(&address("all", Some("B"), Some("all")), &me));
        assert!(!addressed_to(&address("all", Some("all"), Some("L2")), &me));
        assert!(!addressed_to(&address("all", None, Some("all")), &me));
    }

    #[test]
    fn test_route() {
        let me = player();
        let mine = Some(address("mp-7", None, None));

        assert_eq!(route(&record("open", mine.clone()), &me), Route::Display);
        assert_eq!(route(&record("change_settings", mine.clone()), &me), Route::Settings);
        assert_eq!(route(&record("change_server", mine), &me), Route::Settings);
        assert_eq!(route(&record("open", None), &me), Route::Ignore);
        assert_eq!(
            route(&record("change_settings", Some(address("mp-1", None, None))), &me),
            Route::Ignore
        );
    }
}
