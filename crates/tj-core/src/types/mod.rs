//! Shared domain types: trade records, price quotes, user settings.

pub mod quote;
pub mod settings;
pub mod trade;

pub use quote::PriceQuote;
pub use settings::{
    ApiKeySettings, NotificationSettings, ProfileSettings, SecuritySettings, TradingSettings,
    UserSettings,
};
pub use trade::{Direction, NewTrade, Session, TradeRecord, TradeStatus, TradeUpdate};
