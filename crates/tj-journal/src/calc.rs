//! Per-trade financial calculations.
//!
//! Pure helpers shared by the trade store (creation-time risk figures,
//! close-time P&L) and the stats engine (rounding).

use tj_core::types::trade::Direction;

/// Realized P&L of a closed position.
///
/// `(exit - entry) * lot_size`, negated for shorts.
pub fn pnl(entry_price: f64, exit_price: f64, lot_size: f64, direction: Direction) -> f64 {
    (exit_price - entry_price) * lot_size * direction.sign()
}

/// Risk/reward ratio: potential gain (entry to target) over potential loss
/// (entry to stop). Returns 0 when the stop distance is zero.
pub fn risk_reward(entry_price: f64, stop_loss: f64, take_profit: f64) -> f64 {
    let risk = (entry_price - stop_loss).abs();
    let reward = (take_profit - entry_price).abs();
    if risk > 0.0 { reward / risk } else { 0.0 }
}

/// Risk as a percentage of account balance: stop distance times position
/// size over balance.
pub fn risk_percentage(entry_price: f64, stop_loss: f64, lot_size: f64, balance: f64) -> f64 {
    let risk = (entry_price - stop_loss).abs() * lot_size;
    (risk / balance) * 100.0
}

/// Round to 2 decimal places, half away from zero (`f64::round` semantics).
///
/// All currency and percentage outputs of the stats engine go through this.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
