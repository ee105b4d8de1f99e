//! Wire Code Tables
//!
//! Three immutable lookup tables drive the display protocol:
//! - encode: command name -> wire template
//! - decode: reply code (or its 7-character prefix) -> value and group
//! - groups: command name -> group expected in its reply

mod loader;
mod tables;

pub use loader::*;
pub use tables::*;
