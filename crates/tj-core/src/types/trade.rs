//! Trade record types.
//!
//! [`TradeRecord`] is the persisted journal entry. [`NewTrade`] and
//! [`TradeUpdate`] are the create/update payloads accepted by the trade
//! store; derived fields (`pnl`, `rr_ratio`, `entry_date`) are stamped by
//! the store, never supplied at creation.
//!
//! Serde uses camelCase field names so records round-trip against the
//! original journal wire shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Sign applied to the entry/exit price difference when computing P&L.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

/// Trade lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
    Cancelled,
}

/// Trading session the entry was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    #[serde(rename = "asia")]
    Asia,
    #[serde(rename = "london")]
    London,
    #[serde(rename = "newyork")]
    NewYork,
}

impl Session {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Session::Asia => "Asia Session",
            Session::London => "London Session",
            Session::NewYork => "New York Session",
        }
    }

    /// Classify an hour of day (0-23, local to the journal's timezone)
    /// into a trading session: 21:00-05:59 Asia, 06:00-13:59 London,
    /// 14:00-20:59 New York.
    pub fn from_hour(hour: u32) -> Self {
        if hour >= 21 || hour < 6 {
            Session::Asia
        } else if hour < 14 {
            Session::London
        } else {
            Session::NewYork
        }
    }
}

/// A single journal entry: one buy/sell position with entry/exit prices,
/// risk parameters, and P&L once closed.
///
/// Invariants maintained by the trade store:
/// - `pnl` is present and fixed once `status` is `Closed`; while `Open`,
///   unrealized P&L is always derived via [`TradeRecord::unrealized_pnl`],
///   never stored.
/// - `rr_ratio` and `risk_percentage` are computed once at creation from
///   entry/stop/target and never recomputed on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: i64,
    pub instrument: String,
    pub session: Session,
    pub market_bias: String,
    pub bias_notes: Option<String>,
    pub order_type: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub exit_price: Option<f64>,
    pub lot_size: f64,
    pub start_balance: f64,
    pub current_equity: f64,
    pub pnl: Option<f64>,
    pub pnl_percentage: Option<f64>,
    pub risk_percentage: Option<f64>,
    pub rr_ratio: Option<f64>,
    pub status: TradeStatus,
    pub exit_reason: Option<String>,
    pub notes: Option<String>,
    pub entry_date: DateTime<Utc>,
    pub exit_date: Option<DateTime<Utc>>,
}

impl TradeRecord {
    /// Unrealized P&L of an open position: equity movement since entry.
    pub fn unrealized_pnl(&self) -> f64 {
        self.current_equity - self.start_balance
    }
}

/// Payload for creating a trade. The store assigns `id`, stamps
/// `entry_date`, and computes `rr_ratio`/`risk_percentage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrade {
    pub instrument: String,
    pub session: Session,
    pub market_bias: String,
    pub bias_notes: Option<String>,
    pub order_type: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub lot_size: f64,
    pub start_balance: f64,
    pub current_equity: f64,
    pub notes: Option<String>,
}

/// Partial update payload. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeUpdate {
    pub exit_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub current_equity: Option<f64>,
    pub pnl: Option<f64>,
    pub pnl_percentage: Option<f64>,
    pub status: Option<TradeStatus>,
    pub exit_reason: Option<String>,
    pub notes: Option<String>,
}
