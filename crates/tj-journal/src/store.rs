//! Trade persistence port and in-memory reference implementation.
//!
//! [`TradeStore`] is the narrow interface the rest of the system talks to;
//! the stats engine is invoked with the result of
//! [`TradeStore::list_trades`], it never calls the store itself.
//! [`MemoryTradeStore`] backs tests and the runner; a relational adapter
//! would implement the same trait.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use tj_core::types::trade::{NewTrade, Session, TradeRecord, TradeStatus, TradeUpdate};

use crate::calc;

/// Filter for [`TradeStore::filter_trades`]. `None` fields match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct TradeFilter {
    pub instrument: Option<String>,
    pub session: Option<Session>,
    pub status: Option<TradeStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TradeFilter {
    fn matches(&self, trade: &TradeRecord) -> bool {
        if let Some(instrument) = &self.instrument {
            if !trade.instrument.eq_ignore_ascii_case(instrument) {
                return false;
            }
        }
        if let Some(session) = self.session {
            if trade.session != session {
                return false;
            }
        }
        if let Some(status) = self.status {
            if trade.status != status {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if trade.entry_date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if trade.entry_date > end {
                return false;
            }
        }
        true
    }
}

/// Persistence port for journal entries.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// All trades, newest entry first.
    async fn list_trades(&self) -> Result<Vec<TradeRecord>>;

    /// One trade by id, or `None`.
    async fn get_trade(&self, id: i64) -> Result<Option<TradeRecord>>;

    /// Create a trade: assigns the id, stamps `entry_date`, and computes
    /// `rr_ratio`/`risk_percentage` once from entry/stop/target.
    async fn create_trade(&self, new: NewTrade) -> Result<TradeRecord>;

    /// Partially update a trade. Closing a trade (status -> closed) with
    /// an exit price and no explicit `pnl` computes the realized P&L and
    /// stamps `exit_date`. Returns `None` for an unknown id.
    async fn update_trade(&self, id: i64, update: TradeUpdate) -> Result<Option<TradeRecord>>;

    /// Delete a trade. Returns whether anything was removed.
    async fn delete_trade(&self, id: i64) -> Result<bool>;

    /// Trades matching `filter`, newest entry first.
    async fn filter_trades(&self, filter: TradeFilter) -> Result<Vec<TradeRecord>>;
}

#[derive(Default)]
struct Inner {
    trades: HashMap<i64, TradeRecord>,
    next_id: i64,
}

/// In-memory [`TradeStore`] over a `RwLock`ed map.
#[derive(Default)]
pub struct MemoryTradeStore {
    inner: RwLock<Inner>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(trades: &mut [TradeRecord]) {
    trades.sort_by(|a, b| b.entry_date.cmp(&a.entry_date).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn list_trades(&self) -> Result<Vec<TradeRecord>> {
        let inner = self.inner.read().await;
        let mut out: Vec<TradeRecord> = inner.trades.values().cloned().collect();
        newest_first(&mut out);
        Ok(out)
    }

    async fn get_trade(&self, id: i64) -> Result<Option<TradeRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.trades.get(&id).cloned())
    }

    async fn create_trade(&self, new: NewTrade) -> Result<TradeRecord> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;

        // Creation-time risk figures. Never recomputed on update.
        let rr_ratio = match (new.stop_loss, new.take_profit) {
            (Some(stop), Some(target)) => {
                Some(calc::round2(calc::risk_reward(new.entry_price, stop, target)))
            }
            _ => None,
        };
        let risk_percentage = new.stop_loss.map(|stop| {
            calc::round2(calc::risk_percentage(
                new.entry_price,
                stop,
                new.lot_size,
                new.start_balance,
            ))
        });

        let trade = TradeRecord {
            id,
            instrument: new.instrument,
            session: new.session,
            market_bias: new.market_bias,
            bias_notes: new.bias_notes,
            order_type: new.order_type,
            direction: new.direction,
            entry_price: new.entry_price,
            stop_loss: new.stop_loss,
            take_profit: new.take_profit,
            exit_price: None,
            lot_size: new.lot_size,
            start_balance: new.start_balance,
            current_equity: new.current_equity,
            pnl: None,
            pnl_percentage: None,
            risk_percentage,
            rr_ratio,
            status: TradeStatus::Open,
            exit_reason: None,
            notes: new.notes,
            entry_date: Utc::now(),
            exit_date: None,
        };
        debug!("created trade #{id} ({})", trade.instrument);
        inner.trades.insert(id, trade.clone());
        Ok(trade)
    }

    async fn update_trade(&self, id: i64, update: TradeUpdate) -> Result<Option<TradeRecord>> {
        let mut inner = self.inner.write().await;
        let Some(trade) = inner.trades.get_mut(&id) else {
            return Ok(None);
        };

        let was_closed = trade.status == TradeStatus::Closed;

        if let Some(exit_price) = update.exit_price {
            trade.exit_price = Some(exit_price);
        }
        if let Some(stop) = update.stop_loss {
            trade.stop_loss = Some(stop);
        }
        if let Some(target) = update.take_profit {
            trade.take_profit = Some(target);
        }
        if let Some(equity) = update.current_equity {
            trade.current_equity = equity;
        }
        if let Some(status) = update.status {
            trade.status = status;
        }
        if let Some(reason) = update.exit_reason {
            trade.exit_reason = Some(reason);
        }
        if let Some(notes) = update.notes {
            trade.notes = Some(notes);
        }

        // P&L is fixed once closed: only the transition to closed may set it.
        if trade.status == TradeStatus::Closed && !was_closed {
            let pnl = match update.pnl {
                Some(pnl) => Some(pnl),
                None => trade.exit_price.map(|exit| {
                    calc::round2(calc::pnl(
                        trade.entry_price,
                        exit,
                        trade.lot_size,
                        trade.direction,
                    ))
                }),
            };
            trade.pnl = pnl;
            trade.pnl_percentage = match update.pnl_percentage {
                Some(pct) => Some(pct),
                None => pnl
                    .filter(|_| trade.start_balance > 0.0)
                    .map(|pnl| calc::round2(pnl / trade.start_balance * 100.0)),
            };
            if trade.exit_date.is_none() {
                trade.exit_date = Some(Utc::now());
            }
            debug!("closed trade #{id} pnl={:?}", trade.pnl);
        }

        Ok(Some(trade.clone()))
    }

    async fn delete_trade(&self, id: i64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.trades.remove(&id).is_some())
    }

    async fn filter_trades(&self, filter: TradeFilter) -> Result<Vec<TradeRecord>> {
        let inner = self.inner.read().await;
        let mut out: Vec<TradeRecord> =
            inner.trades.values().filter(|t| filter.matches(t)).cloned().collect();
        newest_first(&mut out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tj_core::types::trade::Direction;

    fn new_trade(instrument: &str, direction: Direction) -> NewTrade {
        NewTrade {
            instrument: instrument.to_string(),
            session: Session::London,
            market_bias: "bullish".to_string(),
            bias_notes: None,
            order_type: "market".to_string(),
            direction,
            entry_price: 100.0,
            stop_loss: Some(90.0),
            take_profit: Some(130.0),
            lot_size: 2.0,
            start_balance: 1000.0,
            current_equity: 1000.0,
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_computes_risk_figures_once() {
        let store = MemoryTradeStore::new();
        let trade = store.create_trade(new_trade("XAUUSD", Direction::Long)).await.unwrap();

        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.rr_ratio, Some(3.0));
        // 10 points * 2 lots on a 1000 balance
        assert_eq!(trade.risk_percentage, Some(2.0));
        assert!(trade.pnl.is_none());
    }

    #[tokio::test]
    async fn rr_ratio_fixed_after_creation() {
        let store = MemoryTradeStore::new();
        let trade = store.create_trade(new_trade("XAUUSD", Direction::Long)).await.unwrap();

        let updated = store
            .update_trade(trade.id, TradeUpdate { stop_loss: Some(95.0), ..Default::default() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.stop_loss, Some(95.0));
        assert_eq!(updated.rr_ratio, Some(3.0));
    }

    #[tokio::test]
    async fn closing_computes_pnl_and_exit_date() {
        let store = MemoryTradeStore::new();
        let trade = store.create_trade(new_trade("XAUUSD", Direction::Long)).await.unwrap();

        let closed = store
            .update_trade(
                trade.id,
                TradeUpdate {
                    exit_price: Some(110.0),
                    status: Some(TradeStatus::Closed),
                    exit_reason: Some("tp".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(closed.status, TradeStatus::Closed);
        assert_eq!(closed.pnl, Some(20.0));
        assert_eq!(closed.pnl_percentage, Some(2.0));
        assert!(closed.exit_date.is_some());
    }

    #[tokio::test]
    async fn closing_a_short_negates_the_difference() {
        let store = MemoryTradeStore::new();
        let trade = store.create_trade(new_trade("BTCUSD", Direction::Short)).await.unwrap();

        let closed = store
            .update_trade(
                trade.id,
                TradeUpdate {
                    exit_price: Some(110.0),
                    status: Some(TradeStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.pnl, Some(-20.0));
    }

    #[tokio::test]
    async fn explicit_pnl_wins_over_computed() {
        let store = MemoryTradeStore::new();
        let trade = store.create_trade(new_trade("XAUUSD", Direction::Long)).await.unwrap();

        let closed = store
            .update_trade(
                trade.id,
                TradeUpdate {
                    exit_price: Some(110.0),
                    pnl: Some(19.5),
                    status: Some(TradeStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.pnl, Some(19.5));
    }

    #[tokio::test]
    async fn pnl_immutable_once_closed() {
        let store = MemoryTradeStore::new();
        let trade = store.create_trade(new_trade("XAUUSD", Direction::Long)).await.unwrap();
        store
            .update_trade(
                trade.id,
                TradeUpdate {
                    exit_price: Some(110.0),
                    status: Some(TradeStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let after = store
            .update_trade(
                trade.id,
                TradeUpdate { pnl: Some(999.0), notes: Some("edit".into()), ..Default::default() },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.pnl, Some(20.0));
        assert_eq!(after.notes.as_deref(), Some("edit"));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryTradeStore::new();
        let a = store.create_trade(new_trade("XAUUSD", Direction::Long)).await.unwrap();
        let b = store.create_trade(new_trade("BTCUSD", Direction::Long)).await.unwrap();

        let listed = store.list_trades().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, b.id);
        assert_eq!(listed[1].id, a.id);
    }

    #[tokio::test]
    async fn get_and_delete() {
        let store = MemoryTradeStore::new();
        let trade = store.create_trade(new_trade("XAUUSD", Direction::Long)).await.unwrap();

        assert!(store.get_trade(trade.id).await.unwrap().is_some());
        assert!(store.delete_trade(trade.id).await.unwrap());
        assert!(store.get_trade(trade.id).await.unwrap().is_none());
        assert!(!store.delete_trade(trade.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_unknown_id_is_none() {
        let store = MemoryTradeStore::new();
        let result = store.update_trade(42, TradeUpdate::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn filter_by_instrument_and_status() {
        let store = MemoryTradeStore::new();
        let gold = store.create_trade(new_trade("XAUUSD", Direction::Long)).await.unwrap();
        let btc = store.create_trade(new_trade("BTCUSD", Direction::Long)).await.unwrap();
        store
            .update_trade(
                btc.id,
                TradeUpdate {
                    exit_price: Some(110.0),
                    status: Some(TradeStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let gold_only = store
            .filter_trades(TradeFilter { instrument: Some("xauusd".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(gold_only.len(), 1);
        assert_eq!(gold_only[0].id, gold.id);

        let open_only = store
            .filter_trades(TradeFilter { status: Some(TradeStatus::Open), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(open_only.len(), 1);
        assert_eq!(open_only[0].id, gold.id);
    }

    #[tokio::test]
    async fn filter_by_date_range() {
        let store = MemoryTradeStore::new();
        let trade = store.create_trade(new_trade("XAUUSD", Direction::Long)).await.unwrap();

        let hit = store
            .filter_trades(TradeFilter {
                start_date: Some(trade.entry_date - chrono::Duration::minutes(1)),
                end_date: Some(trade.entry_date + chrono::Duration::minutes(1)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hit.len(), 1);

        let miss = store
            .filter_trades(TradeFilter {
                end_date: Some(trade.entry_date - chrono::Duration::minutes(1)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(miss.is_empty());
    }
}
