//! Price quote type owned by the price aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single price observation for an instrument.
///
/// Created on the first successful observation for a symbol, overwritten in
/// place on every subsequent one. `change`/`change_percent` are deltas
/// against the previously stored price; the first observation has no
/// baseline and carries a zero delta.
///
/// The aggregator hands out clones of this struct only — subscribers never
/// hold a reference into the live table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub last_update: DateTime<Utc>,
}
