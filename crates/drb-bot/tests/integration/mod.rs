//! Integration tests for drb-bot.
//!
//! These tests drive the real WebSocket stack against a local JSON-RPC
//! server:
//! - Connection and authentication lifecycle
//! - Typed gateway calls and their wire format
//! - Session loss on server-side disconnect

pub mod common;
