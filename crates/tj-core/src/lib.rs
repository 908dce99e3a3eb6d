//! # tj-core
//!
//! Core crate for the trading-journal engine, providing:
//!
//! - **Types** (`types`) — trade records, price quotes, user settings
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `JournalError` via thiserror
//! - **WebSocket** (`ws`) — WS client with auto-reconnect
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
