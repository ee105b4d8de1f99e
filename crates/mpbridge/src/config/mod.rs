//! Configuration
//!
//! Loads the bridge configuration and keeps the player identity current.

mod loader;
mod settings;
mod watcher;

pub use loader::*;
pub use settings::*;
pub use watcher::*;
