//! Typed user settings.
//!
//! The settings payload is an explicit record with named sub-structures
//! (profile, trading, notifications, security, API keys) and is validated
//! on every write via [`UserSettings::validate`].

use serde::{Deserialize, Serialize};

use crate::error::JournalError;

/// Full user settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub profile: ProfileSettings,
    pub trading: TradingSettings,
    pub notifications: NotificationSettings,
    pub security: SecuritySettings,
    pub api_keys: ApiKeySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSettings {
    pub name: String,
    pub email: String,
    pub timezone: String,
    pub account_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingSettings {
    pub default_lot_size: f64,
    pub default_risk_percentage: f64,
    pub default_bias: String,
    pub preferred_instruments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub trading_reminders: bool,
    pub news_alerts: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySettings {
    pub two_factor_enabled: bool,
    pub session_timeout_minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeySettings {
    pub finnhub: String,
    pub santiment: String,
    pub news_api: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            profile: ProfileSettings {
                name: String::new(),
                email: String::new(),
                timezone: "UTC".to_string(),
                account_type: "demo".to_string(),
            },
            trading: TradingSettings {
                default_lot_size: 0.01,
                default_risk_percentage: 2.0,
                default_bias: "neutral".to_string(),
                preferred_instruments: vec!["XAUUSD".to_string()],
            },
            notifications: NotificationSettings {
                email_notifications: true,
                push_notifications: false,
                trading_reminders: true,
                news_alerts: true,
            },
            security: SecuritySettings { two_factor_enabled: false, session_timeout_minutes: 30 },
            api_keys: ApiKeySettings::default(),
        }
    }
}

impl UserSettings {
    /// Validate the record. Returns the first offending field as a
    /// [`JournalError::Validation`].
    pub fn validate(&self) -> Result<(), JournalError> {
        if !self.profile.email.is_empty() && !self.profile.email.contains('@') {
            return Err(JournalError::Validation(format!(
                "profile.email is not a valid address: {:?}",
                self.profile.email
            )));
        }
        if self.profile.timezone.is_empty() {
            return Err(JournalError::Validation("profile.timezone must not be empty".into()));
        }
        if !(self.trading.default_lot_size > 0.0) {
            return Err(JournalError::Validation(format!(
                "trading.defaultLotSize must be positive, got {}",
                self.trading.default_lot_size
            )));
        }
        if !(0.0..=100.0).contains(&self.trading.default_risk_percentage) {
            return Err(JournalError::Validation(format!(
                "trading.defaultRiskPercentage must be in 0..=100, got {}",
                self.trading.default_risk_percentage
            )));
        }
        if self.security.session_timeout_minutes == 0 {
            return Err(JournalError::Validation(
                "security.sessionTimeoutMinutes must be positive".into(),
            ));
        }
        Ok(())
    }
}
