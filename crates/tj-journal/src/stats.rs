//! Aggregate trade statistics.
//!
//! [`TradeStats::compute`] is a pure, deterministic transformation from a
//! list of [`TradeRecord`]s to a summary. It never mutates its input and
//! performs no I/O.
//!
//! Drawdown is a peak-to-trough metric over cumulative P&L in **input
//! traversal order**. The engine does not sort: callers needing a
//! time-ordered drawdown sort by entry date first (see
//! [`sort_by_entry_date`]).

use serde::Serialize;
use tj_core::types::trade::{TradeRecord, TradeStatus};

use crate::calc::round2;

/// Summary statistics over a set of journal entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    /// Count of all input records.
    pub total_trades: usize,
    /// Count of records still open.
    pub active_trades: usize,
    /// Percentage of closed trades with positive P&L. 0 when there are no
    /// closed trades.
    pub win_rate: f64,
    /// Sum of per-trade P&L over ALL trades: stored `pnl` for closed ones,
    /// `current_equity - start_balance` (unrealized) for open ones. The
    /// dashboard wants one bottom-line figure, so realized and unrealized
    /// are deliberately mixed; see the note on [`TradeStats`] versioning
    /// in DESIGN.md before changing this.
    pub total_pnl: f64,
    /// Peak-to-trough decline of cumulative P&L as a percentage of the
    /// peak, walked in input order. 0 when the cumulative sum never
    /// declines or never goes positive.
    pub max_drawdown: f64,
}

impl TradeStats {
    /// Compute summary statistics over `trades`.
    ///
    /// A closed trade with a missing `pnl` contributes 0 (lenient
    /// coalescing, matching the journal's historical behavior). Cancelled
    /// trades contribute 0. All percentage and currency outputs are
    /// rounded to 2 decimal places, half away from zero.
    pub fn compute(trades: &[TradeRecord]) -> Self {
        let total_trades = trades.len();
        let active_trades = trades.iter().filter(|t| t.status == TradeStatus::Open).count();

        let closed = trades.iter().filter(|t| t.status == TradeStatus::Closed).count();
        let wins = trades
            .iter()
            .filter(|t| t.status == TradeStatus::Closed && t.pnl.unwrap_or(0.0) > 0.0)
            .count();
        let win_rate = if closed > 0 { wins as f64 / closed as f64 * 100.0 } else { 0.0 };

        // Single pass: total and running peak-to-trough gap over the
        // cumulative per-trade P&L sequence.
        let mut total_pnl = 0.0_f64;
        let mut current = 0.0_f64;
        let mut peak = 0.0_f64;
        let mut max_dd = 0.0_f64;
        for trade in trades {
            let contribution = contribution(trade);
            total_pnl += contribution;
            current += contribution;
            peak = peak.max(current);
            max_dd = max_dd.max(peak - current);
        }
        let max_drawdown = if peak > 0.0 { max_dd / peak * 100.0 } else { 0.0 };

        TradeStats {
            total_trades,
            active_trades,
            win_rate: round2(win_rate),
            total_pnl: round2(total_pnl),
            max_drawdown: round2(max_drawdown),
        }
    }
}

/// Per-trade P&L contribution: realized when closed, unrealized while open.
fn contribution(trade: &TradeRecord) -> f64 {
    match trade.status {
        TradeStatus::Closed => trade.pnl.unwrap_or(0.0),
        TradeStatus::Open => trade.unrealized_pnl(),
        TradeStatus::Cancelled => 0.0,
    }
}

/// Sort trades chronologically (entry date ascending) for a time-ordered
/// drawdown. The store returns newest-first, which is NOT what a
/// drawdown walk usually wants.
pub fn sort_by_entry_date(trades: &mut [TradeRecord]) {
    trades.sort_by_key(|t| t.entry_date);
}
