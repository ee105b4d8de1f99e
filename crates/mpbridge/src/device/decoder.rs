//! Frame Decoder
//!
//! Turns one delimited reply frame into a value and a reply group. The
//! display overloads meaning by length: short replies carry two hex digits
//! after a seven character echo, long ones carry text.

use serde_json::Value;

use crate::codes::{CodeTables, DecodeEntry, ERROR_GROUP, GroupId, UNKNOWN_GROUP};

/// Characters holding the device status (`OK` / `NG`)
const STATUS: std::ops::Range<usize> = 5..7;
/// Length of the command echo used for prefix lookups
const PREFIX_LEN: usize = 7;
/// Frames longer than this carry a text value
const LONG_REPLY_THRESHOLD: usize = 10;
/// Two hex digits after the echo
const HEX_FIELD: std::ops::Range<usize> = 7..9;
/// Text value window of long replies
const TEXT_FIELD: std::ops::Range<usize> = 7..20;

const DEVICE_ERROR: &str = "NG";
const UNRECOGNIZED_PREFIX: &str = "Unknown or wrong command: ";

/// One decoded reply
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub value: Value,
    pub group: GroupId,
    pub raw: String,
    /// Fenced rendering of a prefix-decoded value
    pub extra: Option<String>,
}

/// Which rule a frame falls under
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeMatch<'t> {
    DeviceError,
    Exact(&'t DecodeEntry),
    Prefix(&'t DecodeEntry),
    Unrecognized,
}

/// Resolve the decoding rule for `frame`, in precedence order
pub fn classify<'t>(tables: &'t CodeTables, frame: &str) -> DecodeMatch<'t> {
    if char_slice(frame, STATUS) == DEVICE_ERROR {
        return DecodeMatch::DeviceError;
    }
    if let Some(entry) = tables.decode_exact(frame) {
        return DecodeMatch::Exact(entry);
    }
    let prefix = char_slice(frame, 0..PREFIX_LEN);
    if prefix.chars().count() == PREFIX_LEN {
        if let Some(entry) = tables.decode_prefix(prefix) {
            return DecodeMatch::Prefix(entry);
        }
    }
    DecodeMatch::Unrecognized
}

/// Decode a frame. Never fails; unknown frames decode to group 0.
pub fn decode_frame(tables: &CodeTables, frame: &str) -> DecodedFrame {
    let raw = frame.to_string();
    match classify(tables, frame) {
        DecodeMatch::DeviceError => DecodedFrame {
            value: Value::from(0),
            group: ERROR_GROUP,
            raw,
            extra: None,
        },
        DecodeMatch::Exact(entry) => DecodedFrame {
            value: entry.literal.clone(),
            group: entry.group,
            raw,
            extra: None,
        },
        DecodeMatch::Prefix(entry) => {
            if frame.chars().count() > LONG_REPLY_THRESHOLD {
                let text = char_slice(frame, TEXT_FIELD);
                DecodedFrame {
                    value: Value::from(text),
                    group: entry.group,
                    extra: Some(format!("{}{}", entry.fences.before, text)),
                    raw,
                }
            } else {
                match u8::from_str_radix(char_slice(frame, HEX_FIELD), 16) {
                    Ok(num) => DecodedFrame {
                        value: Value::from(num),
                        group: entry.group,
                        extra: Some(entry.fences.wrap(&num.to_string())),
                        raw,
                    },
                    Err(_) => {
                        tracing::debug!(frame = %frame, "Reply value is not hexadecimal");
                        DecodedFrame {
                            value: Value::Null,
                            group: entry.group,
                            raw,
                            extra: None,
                        }
                    }
                }
            }
        }
        DecodeMatch::Unrecognized => DecodedFrame {
            value: Value::from(format!("{}{}", UNRECOGNIZED_PREFIX, frame)),
            group: UNKNOWN_GROUP,
            raw,
            extra: None,
        },
    }
}

/// Character-indexed substring, clamped to the string's length
fn char_slice(s: &str, range: std::ops::Range<usize>) -> &str {
    let byte_at = |n: usize| s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len());
    let start = byte_at(range.start);
    let end = byte_at(range.end).max(start);
    &s[start..end]
}
