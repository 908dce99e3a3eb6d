//! # tj-journal
//!
//! Trade journal domain logic:
//!
//! - [`calc`] — per-trade financial calculations (P&L, risk/reward, risk %)
//! - [`stats`] — aggregate statistics over a list of trade records
//! - [`store`] — the `TradeStore` persistence port and its in-memory
//!   reference implementation

pub mod calc;
pub mod stats;
pub mod store;

pub use stats::TradeStats;
pub use store::{MemoryTradeStore, TradeFilter, TradeStore};
