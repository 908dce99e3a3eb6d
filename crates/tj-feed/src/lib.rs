//! # tj-feed
//!
//! Live price aggregation for the trading journal.
//!
//! ## Architecture
//!
//! [`PriceAggregator`] owns a symbol -> [`tj_core::PriceQuote`] table and a
//! set of subscribers. Each symbol is served by exactly one feed strategy,
//! chosen by a static config lookup:
//!
//! - **Polling** ([`poll`]) — a tokio interval task fetching the latest
//!   price from a REST provider behind the [`poll::QuoteFetcher`] trait.
//! - **Streaming** ([`binance`]) — a reconnecting WebSocket connection to
//!   the exchange trade stream, pushing each tick as it arrives.
//!
//! Both paths funnel into the same write-then-fan-out critical section;
//! subscribers always receive a defensive snapshot copy, never a live
//! reference.

pub mod aggregator;
pub mod binance;
pub mod poll;

pub use aggregator::{PriceAggregator, PriceCallback, Subscription};
pub use poll::{GoldApiFetcher, PolledQuote, QuoteFetcher};
