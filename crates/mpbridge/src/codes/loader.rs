//! Code Table Loader
//!
//! Reads the three JSON tables and validates them before use.
//!
//! ```json
//! // commands.json
//! { "open": "ka 01 01", "set_volume": { "template": "kf 01 ", "param": "hex" } }
//! // responses.json
//! { "a 01 OK01": ["on", 2], "n 01 OK": [{ "a": "Temperature: ", "b": " C" }, 3] }
//! // groups.json
//! { "open": 2, "temp": 3 }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use super::tables::*;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Failed to read {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {table} table: {source}")]
    Parse {
        table: &'static str,
        source: serde_json::Error,
    },

    #[error("Invalid {table} table: {reason}")]
    Invalid { table: &'static str, reason: String },
}

/// Locations of the three table files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFiles {
    pub commands: PathBuf,
    pub responses: PathBuf,
    pub groups: PathBuf,
}

impl Default for TableFiles {
    fn default() -> Self {
        Self {
            commands: PathBuf::from("tables/commands.json"),
            responses: PathBuf::from("tables/responses.json"),
            groups: PathBuf::from("tables/groups.json"),
        }
    }
}

impl TableFiles {
    /// Resolve relative paths against `base`
    pub fn relative_to(&self, base: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };
        Self {
            commands: resolve(&self.commands),
            responses: resolve(&self.responses),
            groups: resolve(&self.groups),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEncode {
    Template(String),
    Detailed {
        template: String,
        #[serde(default)]
        param: ParamFormat,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDecode {
    Pair(Value, GroupId),
    Detailed { value: Value, group: GroupId },
}

impl CodeTables {
    /// Read and validate the tables from disk
    pub async fn load(files: &TableFiles) -> Result<Self, TableError> {
        let commands = read(&files.commands).await?;
        let responses = read(&files.responses).await?;
        let groups = read(&files.groups).await?;

        let tables = Self::from_json(&commands, &responses, &groups)?;
        info!(
            commands = tables.encode_len(),
            replies = tables.decode_len(),
            groups = tables.groups_len(),
            "Loaded code tables"
        );
        Ok(tables)
    }

    /// Build the tables from JSON documents
    pub fn from_json(commands: &str, responses: &str, groups: &str) -> Result<Self, TableError> {
        let raw_encode: HashMap<String, RawEncode> =
            serde_json::from_str(commands).map_err(|source| TableError::Parse {
                table: "commands",
                source,
            })?;
        let raw_decode: HashMap<String, RawDecode> =
            serde_json::from_str(responses).map_err(|source| TableError::Parse {
                table: "responses",
                source,
            })?;
        let groups: HashMap<String, GroupId> =
            serde_json::from_str(groups).map_err(|source| TableError::Parse {
                table: "groups",
                source,
            })?;

        let encode = raw_encode
            .into_iter()
            .map(|(name, raw)| {
                let entry = match raw {
                    RawEncode::Template(template) => EncodeEntry {
                        template,
                        param: ParamFormat::Literal,
                    },
                    RawEncode::Detailed { template, param } => EncodeEntry { template, param },
                };
                (name, entry)
            })
            .collect();

        let decode = raw_decode
            .into_iter()
            .map(|(code, raw)| {
                let entry = match raw {
                    RawDecode::Pair(value, group) | RawDecode::Detailed { value, group } => {
                        DecodeEntry::new(value, group)
                    }
                };
                (code, entry)
            })
            .collect();

        let tables = Self {
            encode,
            decode,
            groups,
        };
        tables.validate()?;
        Ok(tables)
    }

    fn validate(&self) -> Result<(), TableError> {
        for (name, entry) in &self.encode {
            check_key("commands", name)?;
            if entry.template.is_empty() || !entry.template.is_ascii() {
                return Err(TableError::Invalid {
                    table: "commands",
                    reason: format!("template for '{}' must be non-empty ASCII", name),
                });
            }
        }

        for (code, entry) in &self.decode {
            check_key("responses", code)?;
            check_group("responses", code, entry.group)?;
        }

        for (name, group) in &self.groups {
            check_key("groups", name)?;
            check_group("groups", name, *group)?;
        }

        for name in self.encode.keys() {
            if !self.groups.contains_key(name) {
                warn!(command = %name, "Command has no reply group; its replies will never match");
            }
        }
        for name in self.groups.keys() {
            if !self.encode.contains_key(name) {
                debug!(command = %name, "Reply group for a command that cannot be sent");
            }
        }

        Ok(())
    }
}

fn check_key(table: &'static str, key: &str) -> Result<(), TableError> {
    if key.is_empty() || !key.is_ascii() {
        return Err(TableError::Invalid {
            table,
            reason: format!("key {:?} must be non-empty ASCII", key),
        });
    }
    Ok(())
}

fn check_group(table: &'static str, key: &str, group: GroupId) -> Result<(), TableError> {
    if group < 0 {
        return Err(TableError::Invalid {
            table,
            reason: format!("group {} of '{}' is negative", group, key),
        });
    }
    Ok(())
}

async fn read(path: &Path) -> Result<String, TableError> {
    fs::read_to_string(path)
        .await
        .map_err(|source| TableError::Read {
            path: path.to_path_buf(),
            source,
        })
}
