//! Configuration parsing for the trading-journal engine.
//!
//! All modules read their settings from a single JSON config file. The
//! top-level structure contains journal metadata (name, log path), the
//! price-feed configuration, and optionally a persisted [`UserSettings`]
//! record.
//!
//! # Example config
//!
//! ```json
//! {
//!   "journal": { "module_name": "tradelog", "log_path": "/tmp/tradelog" },
//!   "feed": {
//!     "poll_interval_sec": 10,
//!     "poll_symbols": ["XAUUSD"],
//!     "stream_symbols": ["BTCUSD", "ETHUSD"]
//!   }
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::types::settings::UserSettings;

/// Default polling interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SEC: u64 = 10;

/// Default REST endpoint base for polled metal quotes.
pub const DEFAULT_GOLD_API_URL: &str = "https://api.gold-api.com";

/// Default WebSocket endpoint base for streamed crypto quotes.
pub const DEFAULT_BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Journal metadata (name, log path).
    pub journal: Option<ModuleMeta>,

    /// Price feed configuration.
    pub feed: Option<FeedConfig>,

    /// Persisted user settings, validated on load.
    pub settings: Option<UserSettings>,
}

impl AppConfig {
    /// Returns the module name, defaulting to `"tradelog"`.
    pub fn module_name(&self) -> String {
        self.journal
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| "tradelog".to_string())
    }

    /// Returns the log path, if configured.
    pub fn log_path(&self) -> Option<String> {
        self.journal.as_ref().and_then(|m| m.log_path.clone())
    }

    /// Returns the feed config, falling back to all defaults.
    pub fn effective_feed(&self) -> FeedConfig {
        self.feed.clone().unwrap_or_default()
    }
}

/// Journal metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// Which feed strategy serves a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Fixed-interval REST polling.
    Polling,
    /// Push-based WebSocket trade stream.
    Streaming,
}

/// Price feed configuration.
///
/// Each symbol is served by exactly one strategy, chosen by a static
/// lookup: symbols listed in `stream_symbols` use the WebSocket stream,
/// everything else (including symbols in neither list) is polled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedConfig {
    /// Polling interval in seconds (default: 10).
    pub poll_interval_sec: Option<u64>,

    /// Symbols refreshed by REST polling (e.g. `["XAUUSD"]`).
    pub poll_symbols: Option<Vec<String>>,

    /// Symbols refreshed by the WebSocket trade stream.
    pub stream_symbols: Option<Vec<String>>,

    /// REST endpoint base for polled quotes.
    pub gold_api_url: Option<String>,

    /// WebSocket endpoint base for streamed quotes.
    pub binance_ws_url: Option<String>,
}

impl FeedConfig {
    /// Returns the effective polling interval.
    pub fn effective_poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_sec.unwrap_or(DEFAULT_POLL_INTERVAL_SEC))
    }

    /// Returns the effective REST endpoint base.
    pub fn effective_gold_api_url(&self) -> String {
        self.gold_api_url.clone().unwrap_or_else(|| DEFAULT_GOLD_API_URL.to_string())
    }

    /// Returns the effective WebSocket endpoint base.
    pub fn effective_binance_ws_url(&self) -> String {
        self.binance_ws_url.clone().unwrap_or_else(|| DEFAULT_BINANCE_WS_URL.to_string())
    }

    /// Returns all configured symbols (polled and streamed).
    pub fn all_symbols(&self) -> Vec<String> {
        let mut out = self.poll_symbols.clone().unwrap_or_default();
        out.extend(self.stream_symbols.clone().unwrap_or_default());
        out
    }

    /// Classify a symbol into its feed strategy.
    pub fn kind_for(&self, symbol: &str) -> FeedKind {
        let streamed = self
            .stream_symbols
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|s| s.eq_ignore_ascii_case(symbol));
        if streamed { FeedKind::Streaming } else { FeedKind::Polling }
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    if let Some(settings) = &config.settings {
        settings.validate()?;
    }
    Ok(config)
}
