//! mpbridge - Media Player Display Bridge
//!
//! Connects a publish/subscribe command bus to a display controlled over a
//! half-duplex serial line:
//! - Code tables that translate command names to wire codes and replies back
//! - A FIFO command queue correlated against device replies
//! - Bus records, player routing and notification envelopes
//! - Layered configuration with live reload of the player identity

// Wire code tables
pub mod codes;

// Command queue, correlation engine and serial link
pub mod device;

// Bus records and adapters
pub mod bus;

// Configuration loading and watching
pub mod config;
