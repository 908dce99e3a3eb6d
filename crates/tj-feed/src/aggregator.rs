//! The price aggregator service.
//!
//! Maintains a live symbol -> [`PriceQuote`] table refreshed by per-symbol
//! feed tasks and fans every update out to subscribers. Explicitly constructed
//! and dependency-injected — construct on app start, [`stop_updates`] on
//! shutdown; never a process-wide global.
//!
//! ## Concurrency
//!
//! Polling ticks and streaming messages arrive interleaved. All writes to
//! the price table and the subscriber set go through one mutex; the
//! notification step runs after the lock is released on a stable snapshot
//! copy, so a slow or panicking subscriber can never stall a feed or hold
//! the table locked.
//!
//! [`stop_updates`]: PriceAggregator::stop_updates

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use tj_core::config::{FeedConfig, FeedKind};
use tj_core::types::PriceQuote;
use tj_core::ws::{OnMessageCallback, WsConnConfig, WsConnection};

use crate::binance;
use crate::poll::{GoldApiFetcher, QuoteFetcher};

/// Callback invoked with a full snapshot of the price table on every
/// update. Fire-and-forget: the aggregator never awaits it.
pub type PriceCallback = Arc<dyn Fn(HashMap<String, PriceQuote>) + Send + Sync>;

/// Shared mutable state: the price table and the subscriber set.
#[derive(Default)]
struct State {
    prices: HashMap<String, PriceQuote>,
    subscribers: HashMap<u64, PriceCallback>,
    next_sub_id: u64,
}

struct Shared {
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // A subscriber can only panic outside the lock, but recover from
        // poisoning anyway rather than propagating it into feed tasks.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Critical section: write the quote, then notify subscribers on a
    /// snapshot taken after the write, outside the lock.
    fn apply_update(&self, symbol: &str, price: f64, observed_at: DateTime<Utc>) {
        let (snapshot, callbacks) = {
            let mut state = self.lock();

            // Delta against the previously stored price; the first
            // observation has no baseline and carries a zero delta.
            let (change, change_percent) = match state.prices.get(symbol).map(|q| q.price) {
                Some(prev) if prev != 0.0 => (price - prev, (price - prev) / prev * 100.0),
                _ => (0.0, 0.0),
            };

            state.prices.insert(
                symbol.to_string(),
                PriceQuote {
                    symbol: symbol.to_string(),
                    price,
                    change,
                    change_percent,
                    last_update: observed_at,
                },
            );

            let snapshot = state.prices.clone();
            let callbacks: Vec<PriceCallback> = state.subscribers.values().cloned().collect();
            (snapshot, callbacks)
        };

        notify(&snapshot, &callbacks);
    }
}

/// Invoke every callback with its own copy of the snapshot. A panicking
/// subscriber is logged and skipped; the rest are still notified.
fn notify(snapshot: &HashMap<String, PriceQuote>, callbacks: &[PriceCallback]) {
    for callback in callbacks {
        let copy = snapshot.clone();
        if std::panic::catch_unwind(AssertUnwindSafe(|| callback(copy))).is_err() {
            warn!("price subscriber panicked during notification");
        }
    }
}

/// Handle for one running feed.
enum FeedHandle {
    Polling { shutdown: watch::Sender<bool>, task: tokio::task::JoinHandle<()> },
    Streaming(WsConnection),
}

/// Subscription handle returned by [`PriceAggregator::subscribe`].
/// Unsubscribes on drop; other subscribers are unaffected.
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Explicitly unsubscribe (equivalent to dropping the handle).
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.lock().subscribers.remove(&self.id);
        }
    }
}

/// Live price table with per-symbol feed tasks and subscriber fan-out.
pub struct PriceAggregator {
    shared: Arc<Shared>,
    feeds: Mutex<HashMap<String, FeedHandle>>,
    fetcher: Arc<dyn QuoteFetcher>,
    config: FeedConfig,
}

impl PriceAggregator {
    /// Aggregator with the production REST fetcher.
    pub fn new(config: FeedConfig) -> Self {
        let fetcher = Arc::new(GoldApiFetcher::new(config.effective_gold_api_url()));
        Self::with_fetcher(config, fetcher)
    }

    /// Aggregator with an injected polled-quote source (used by tests).
    pub fn with_fetcher(config: FeedConfig, fetcher: Arc<dyn QuoteFetcher>) -> Self {
        Self {
            shared: Arc::new(Shared { state: Mutex::new(State::default()) }),
            feeds: Mutex::new(HashMap::new()),
            fetcher,
            config,
        }
    }

    /// Begin refreshing quotes for `symbols`.
    ///
    /// Incremental: symbols that already have a running feed are left
    /// untouched — only the missing ones get new tasks. Calling this again
    /// with additional symbols never interrupts existing feeds.
    pub fn start_updates(&self, symbols: &[String]) {
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        for symbol in symbols {
            if feeds.contains_key(symbol) {
                debug!("[feed-{symbol}] already running, skipping");
                continue;
            }
            let handle = match self.config.kind_for(symbol) {
                FeedKind::Polling => self.spawn_polling(symbol),
                FeedKind::Streaming => self.spawn_streaming(symbol),
            };
            feeds.insert(symbol.clone(), handle);
        }
    }

    fn spawn_polling(&self, symbol: &str) -> FeedHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let fetcher = Arc::clone(&self.fetcher);
        let period = self.config.effective_poll_interval();
        let symbol = symbol.to_string();

        info!("[feed-{symbol}] starting polling feed ({period:?})");
        let task = tokio::spawn(async move {
            // First tick fires immediately, so a fresh symbol gets a quote
            // without waiting a full period.
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("[feed-{symbol}] polling stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        match fetcher.fetch(&symbol).await {
                            Ok(quote) => shared.apply_update(&symbol, quote.price, quote.updated_at),
                            // Stale-but-present beats missing: keep the old
                            // quote and try again next cycle.
                            Err(e) => warn!("[feed-{symbol}] fetch failed: {e}"),
                        }
                    }
                }
            }
        });

        FeedHandle::Polling { shutdown: shutdown_tx, task }
    }

    fn spawn_streaming(&self, symbol: &str) -> FeedHandle {
        let url = binance::stream_url(&self.config.effective_binance_ws_url(), symbol);
        let shared = Arc::clone(&self.shared);
        let sym = symbol.to_string();

        let on_text: OnMessageCallback = Arc::new(move |text| {
            if let Some(price) = binance::parse_trade_price(text) {
                shared.apply_update(&sym, price, Utc::now());
            }
        });

        info!("[feed-{symbol}] starting streaming feed");
        let mut conn = WsConnection::new(WsConnConfig {
            url,
            subscribe_msg: None,
            label: symbol.to_string(),
        });
        conn.start(on_text);
        FeedHandle::Streaming(conn)
    }

    /// Terminate all feeds: cancel polling timers, close streaming
    /// connections, clear feed state. The last-known price table is kept
    /// and stays queryable. After this returns, no further writes occur.
    pub async fn stop_updates(&self) {
        let handles: Vec<(String, FeedHandle)> = {
            let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
            feeds.drain().collect()
        };
        for (symbol, handle) in handles {
            match handle {
                FeedHandle::Polling { shutdown, task } => {
                    let _ = shutdown.send(true);
                    let _ = task.await;
                }
                FeedHandle::Streaming(mut conn) => conn.stop().await,
            }
            info!("[feed-{symbol}] stopped");
        }
    }

    /// Symbols with a running feed.
    pub fn active_feeds(&self) -> Vec<String> {
        let feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<String> = feeds.keys().cloned().collect();
        out.sort();
        out
    }

    /// Register a price subscriber.
    ///
    /// The callback fires immediately with whatever data exists so far,
    /// then once per update to any symbol, each time with a defensive
    /// snapshot copy. Dropping the returned handle unsubscribes.
    pub fn subscribe(&self, callback: PriceCallback) -> Subscription {
        let (id, snapshot) = {
            let mut state = self.shared.lock();
            let id = state.next_sub_id;
            state.next_sub_id += 1;
            state.subscribers.insert(id, Arc::clone(&callback));
            (id, state.prices.clone())
        };
        notify(&snapshot, std::slice::from_ref(&callback));
        Subscription { id, shared: Arc::downgrade(&self.shared) }
    }

    /// Current quote for one symbol. Never blocks on network.
    pub fn get_price(&self, symbol: &str) -> Option<PriceQuote> {
        self.shared.lock().prices.get(symbol).cloned()
    }

    /// Snapshot of the whole price table. Never blocks on network.
    pub fn get_all_prices(&self) -> HashMap<String, PriceQuote> {
        self.shared.lock().prices.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PolledQuote;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Fetcher returning an increasing price per symbol and counting calls.
    #[derive(Default)]
    struct MockFetcher {
        calls: Mutex<HashMap<String, u64>>,
    }

    impl MockFetcher {
        fn call_count(&self, symbol: &str) -> u64 {
            *self.calls.lock().unwrap().get(symbol).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl QuoteFetcher for MockFetcher {
        async fn fetch(&self, symbol: &str) -> Result<PolledQuote> {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(symbol.to_string()).or_insert(0);
            *n += 1;
            Ok(PolledQuote { price: 1000.0 + *n as f64, updated_at: Utc::now() })
        }
    }

    fn polling_config() -> FeedConfig {
        FeedConfig { poll_interval_sec: Some(5), ..Default::default() }
    }

    fn aggregator_with_mock() -> (PriceAggregator, Arc<MockFetcher>) {
        let fetcher = Arc::new(MockFetcher::default());
        let aggregator =
            PriceAggregator::with_fetcher(polling_config(), Arc::clone(&fetcher) as Arc<dyn QuoteFetcher>);
        (aggregator, fetcher)
    }

    /// Subscriber that appends every received snapshot.
    fn recording_subscriber() -> (PriceCallback, Arc<Mutex<Vec<HashMap<String, PriceQuote>>>>) {
        let received: Arc<Mutex<Vec<HashMap<String, PriceQuote>>>> =
            Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let callback: PriceCallback = Arc::new(move |snapshot| {
            sink.lock().unwrap().push(snapshot);
        });
        (callback, received)
    }

    #[test]
    fn first_observation_has_zero_delta() {
        let (aggregator, _) = aggregator_with_mock();
        aggregator.shared.apply_update("XAUUSD", 2400.0, Utc::now());

        let quote = aggregator.get_price("XAUUSD").unwrap();
        assert_eq!(quote.price, 2400.0);
        assert_eq!(quote.change, 0.0);
        assert_eq!(quote.change_percent, 0.0);
    }

    #[test]
    fn second_observation_computes_delta() {
        let (aggregator, _) = aggregator_with_mock();
        aggregator.shared.apply_update("XAUUSD", 2000.0, Utc::now());
        aggregator.shared.apply_update("XAUUSD", 2100.0, Utc::now());

        let quote = aggregator.get_price("XAUUSD").unwrap();
        assert_eq!(quote.price, 2100.0);
        assert_eq!(quote.change, 100.0);
        assert!((quote.change_percent - 5.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_reads_are_idempotent() {
        let (aggregator, _) = aggregator_with_mock();
        aggregator.shared.apply_update("XAUUSD", 2400.0, Utc::now());
        aggregator.shared.apply_update("BTCUSD", 65000.0, Utc::now());

        let first = aggregator.get_all_prices();
        let second = aggregator.get_all_prices();
        assert_eq!(first, second);
    }

    #[test]
    fn mutating_a_snapshot_does_not_touch_internal_state() {
        let (aggregator, _) = aggregator_with_mock();
        aggregator.shared.apply_update("XAUUSD", 2400.0, Utc::now());

        let mut snapshot = aggregator.get_all_prices();
        snapshot.get_mut("XAUUSD").unwrap().price = 1.0;
        snapshot.remove("XAUUSD");

        assert_eq!(aggregator.get_price("XAUUSD").unwrap().price, 2400.0);
    }

    #[test]
    fn subscribers_receive_independent_copies() {
        let (aggregator, _) = aggregator_with_mock();
        let (callback_a, received_a) = recording_subscriber();
        let (callback_b, received_b) = recording_subscriber();
        let _sub_a = aggregator.subscribe(callback_a);
        let _sub_b = aggregator.subscribe(callback_b);

        aggregator.shared.apply_update("XAUUSD", 2400.0, Utc::now());

        // Mutate A's delivered snapshot; B's copy must be unaffected.
        {
            let mut a = received_a.lock().unwrap();
            a.last_mut().unwrap().get_mut("XAUUSD").unwrap().price = 1.0;
        }
        let b = received_b.lock().unwrap();
        assert_eq!(b.last().unwrap()["XAUUSD"].price, 2400.0);
    }

    #[test]
    fn subscribe_delivers_immediate_snapshot() {
        let (aggregator, _) = aggregator_with_mock();
        aggregator.shared.apply_update("XAUUSD", 2400.0, Utc::now());

        let (callback, received) = recording_subscriber();
        let _sub = aggregator.subscribe(callback);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["XAUUSD"].price, 2400.0);
    }

    #[test]
    fn unsubscribing_one_leaves_the_other_running() {
        let (aggregator, _) = aggregator_with_mock();
        let (callback_a, received_a) = recording_subscriber();
        let (callback_b, received_b) = recording_subscriber();
        let sub_a = aggregator.subscribe(callback_a);
        let _sub_b = aggregator.subscribe(callback_b);

        aggregator.shared.apply_update("XAUUSD", 2400.0, Utc::now());
        sub_a.unsubscribe();
        aggregator.shared.apply_update("XAUUSD", 2500.0, Utc::now());

        // A: immediate + first update only. B: immediate + both updates.
        assert_eq!(received_a.lock().unwrap().len(), 2);
        assert_eq!(received_b.lock().unwrap().len(), 3);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let (aggregator, _) = aggregator_with_mock();
        let bad: PriceCallback = Arc::new(|_| panic!("misbehaving subscriber"));
        let (good, received) = recording_subscriber();
        let _sub_bad = aggregator.subscribe(bad);
        let _sub_good = aggregator.subscribe(good);

        aggregator.shared.apply_update("XAUUSD", 2400.0, Utc::now());

        assert_eq!(received.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_feed_writes_quotes() {
        let (aggregator, fetcher) = aggregator_with_mock();
        aggregator.start_updates(&["XAUUSD".to_string()]);

        // First interval tick is immediate.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(fetcher.call_count("XAUUSD") >= 1);
        assert!(aggregator.get_price("XAUUSD").is_some());

        aggregator.stop_updates().await;
    }

    #[tokio::test(start_paused = true)]
    async fn adding_symbols_does_not_disturb_running_feeds() {
        let (aggregator, fetcher) = aggregator_with_mock();
        aggregator.start_updates(&["XAUUSD".to_string()]);
        tokio::time::sleep(Duration::from_secs(11)).await;
        let xau_before = fetcher.call_count("XAUUSD");
        assert!(xau_before >= 2);

        // Second call adds BTCUSD; the XAUUSD feed keeps its cadence and
        // is not torn down or duplicated.
        aggregator.start_updates(&["XAUUSD".to_string(), "BTCUSD".to_string()]);
        assert_eq!(aggregator.active_feeds(), vec!["BTCUSD".to_string(), "XAUUSD".to_string()]);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let xau_after = fetcher.call_count("XAUUSD");
        assert!(xau_after > xau_before);
        assert_eq!(xau_after - xau_before, 2);
        assert!(fetcher.call_count("BTCUSD") >= 1);

        aggregator.stop_updates().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_keeps_last_known_quotes() {
        let (aggregator, fetcher) = aggregator_with_mock();
        aggregator.start_updates(&["XAUUSD".to_string()]);
        tokio::time::sleep(Duration::from_millis(10)).await;

        aggregator.stop_updates().await;
        assert!(aggregator.active_feeds().is_empty());

        // Table survives the stop and no further writes happen.
        let frozen = fetcher.call_count("XAUUSD");
        let snapshot = aggregator.get_all_prices();
        assert!(snapshot.contains_key("XAUUSD"));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fetcher.call_count("XAUUSD"), frozen);
        assert_eq!(aggregator.get_all_prices(), snapshot);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_keeps_stale_quote_and_other_feeds() {
        /// Fails for one symbol, succeeds for the rest.
        struct FlakyFetcher {
            fail_symbol: String,
            ok_calls: AtomicU64,
        }

        #[async_trait]
        impl QuoteFetcher for FlakyFetcher {
            async fn fetch(&self, symbol: &str) -> Result<PolledQuote> {
                if symbol == self.fail_symbol {
                    anyhow::bail!("provider unavailable");
                }
                self.ok_calls.fetch_add(1, Ordering::SeqCst);
                Ok(PolledQuote { price: 42.0, updated_at: Utc::now() })
            }
        }

        let fetcher = Arc::new(FlakyFetcher {
            fail_symbol: "XAGUSD".to_string(),
            ok_calls: AtomicU64::new(0),
        });
        let aggregator =
            PriceAggregator::with_fetcher(polling_config(), Arc::clone(&fetcher) as Arc<dyn QuoteFetcher>);

        aggregator.start_updates(&["XAGUSD".to_string(), "XAUUSD".to_string()]);
        tokio::time::sleep(Duration::from_secs(11)).await;

        // The failing symbol never materializes a quote but the healthy
        // feed keeps updating.
        assert!(aggregator.get_price("XAGUSD").is_none());
        assert!(aggregator.get_price("XAUUSD").is_some());
        assert!(fetcher.ok_calls.load(Ordering::SeqCst) >= 2);

        aggregator.stop_updates().await;
    }
}
