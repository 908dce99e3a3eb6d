//! Binance trade-stream helpers.
//!
//! The journal's crypto symbols are quoted as `BTCUSD`/`ETHUSD`; Binance
//! streams the tether pair, so the stream name is the lowercased symbol
//! with a `t` appended (`BTCUSD` -> `btcusdt@trade`).

use tracing::trace;

/// Build the raw trade-stream URL for a symbol.
pub fn stream_url(base: &str, symbol: &str) -> String {
    format!("{}/{}t@trade", base, symbol.to_lowercase())
}

/// Extract the trade price from an `@trade` stream message.
///
/// Returns `None` for anything that is not a trade event (subscription
/// acks, malformed frames) — those are simply skipped.
pub fn parse_trade_price(text: &str) -> Option<f64> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;
    if v.get("e")?.as_str()? != "trade" {
        trace!("ignoring non-trade event");
        return None;
    }
    v.get("p")?.as_str()?.parse::<f64>().ok()
}
