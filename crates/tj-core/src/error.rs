//! Typed error definitions for the trading-journal engine.
//!
//! Provides [`JournalError`] for domain-specific errors that are more
//! informative than plain `anyhow::Error` strings. All variants implement
//! `std::error::Error` via `thiserror`, so they integrate seamlessly with
//! `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the trading-journal engine.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Settings or trade field validation error.
    #[error("validation error: {0}")]
    Validation(String),

    /// Price feed connection or fetch error.
    #[error("feed error: {0}")]
    Feed(String),

    /// Quote payload or trade message parsing error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Trade store access error.
    #[error("storage error: {0}")]
    Storage(String),
}
