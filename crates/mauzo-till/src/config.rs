//! # Till Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MAUZO_DB_PATH=/data/mauzo.db                                       │
//! │     MAUZO_USER_ID=cashier-2                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/mauzo-pos/till.toml (Linux)                              │
//! │     ~/Library/Application Support/com.mauzo.pos/till.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # till.toml
//! [store]
//! name = "Duka la Mama Njeri"
//! currency = "KES"
//!
//! [till]
//! user_id = "cashier-1"
//! device_id = "till-01"
//!
//! [database]
//! path = "/var/lib/mauzo/mauzo.db"
//!
//! [payments]
//! stk_timeout_secs = 60
//! simulated_confirm_ms = 1500
//! ```

use mauzo_core::Money;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{TillError, TillResult};

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_name")]
    pub name: String,

    /// ISO code printed in front of amounts.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_store_name() -> String {
    "Mauzo Store".to_string()
}

fn default_currency() -> String {
    "KES".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: default_store_name(),
            currency: default_currency(),
        }
    }
}

/// Who is operating which drawer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default = "default_device_id")]
    pub device_id: String,
}

fn default_user_id() -> String {
    "cashier-1".to_string()
}

fn default_device_id() -> String {
    "till-01".to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            user_id: default_user_id(),
            device_id: default_device_id(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Falls back to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// How long to wait for an STK push to be confirmed.
    #[serde(default = "default_stk_timeout")]
    pub stk_timeout_secs: u64,

    /// Delay before the simulated gateway confirms a push.
    #[serde(default = "default_simulated_confirm")]
    pub simulated_confirm_ms: u64,
}

fn default_stk_timeout() -> u64 {
    60
}

fn default_simulated_confirm() -> u64 {
    1500
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            stk_timeout_secs: default_stk_timeout(),
            simulated_confirm_ms: default_simulated_confirm(),
        }
    }
}

// =============================================================================
// Till Configuration
// =============================================================================

/// Complete till configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TillConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub till: DeviceSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub payments: PaymentSettings,
}

impl TillConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (till.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> TillResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading till config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document, then validates it. No environment overrides.
    pub fn from_toml(contents: &str) -> TillResult<Self> {
        let config: TillConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TillResult<()> {
        if self.till.user_id.trim().is_empty() {
            return Err(TillError::InvalidConfig("till.user_id must not be empty".into()));
        }
        if self.till.device_id.trim().is_empty() {
            return Err(TillError::InvalidConfig(
                "till.device_id must not be empty".into(),
            ));
        }
        if self.payments.stk_timeout_secs == 0 {
            return Err(TillError::InvalidConfig(
                "payments.stk_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.store.currency.trim().is_empty() {
            return Err(TillError::InvalidConfig("store.currency must not be empty".into()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MAUZO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(name) = std::env::var("MAUZO_STORE_NAME") {
            self.store.name = name;
        }

        if let Ok(user_id) = std::env::var("MAUZO_USER_ID") {
            debug!(user_id = %user_id, "Overriding user ID from environment");
            self.till.user_id = user_id;
        }

        if let Ok(device_id) = std::env::var("MAUZO_DEVICE_ID") {
            self.till.device_id = device_id;
        }

        if let Ok(currency) = std::env::var("MAUZO_CURRENCY") {
            self.store.currency = currency.to_uppercase();
        }

        if let Ok(secs) = std::env::var("MAUZO_STK_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.payments.stk_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring non-numeric MAUZO_STK_TIMEOUT_SECS"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "mauzo", "pos")
    }

    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("till.toml"))
    }

    /// The database file to open.
    ///
    /// ## Platform-Specific Paths
    /// - **macOS**: `~/Library/Application Support/com.mauzo.pos/mauzo.db`
    /// - **Windows**: `%APPDATA%\mauzo\pos\data\mauzo.db`
    /// - **Linux**: `~/.local/share/mauzo-pos/mauzo.db`
    pub fn database_path(&self) -> TillResult<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        let dirs = Self::project_dirs().ok_or_else(|| {
            TillError::InvalidConfig("Could not determine app data directory".into())
        })?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        Ok(data_dir.join("mauzo.db"))
    }

    pub fn stk_timeout(&self) -> Duration {
        Duration::from_secs(self.payments.stk_timeout_secs)
    }

    pub fn simulated_confirm_delay(&self) -> Duration {
        Duration::from_millis(self.payments.simulated_confirm_ms)
    }

    /// Formats an amount for receipts: `KES 1,200.00`.
    pub fn format_currency(&self, amount: Money) -> String {
        let sign = if amount.is_negative() { "-" } else { "" };
        let abs = amount.abs();

        let digits = abs.major().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        format!(
            "{} {}{}.{:02}",
            self.store.currency,
            sign,
            grouped,
            abs.minor_part()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = TillConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.currency, "KES");
        assert_eq!(config.stk_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TillConfig::from_toml(
            r#"
            [till]
            user_id = "wanjiru"

            [payments]
            stk_timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.till.user_id, "wanjiru");
        assert_eq!(config.till.device_id, "till-01");
        assert_eq!(config.payments.stk_timeout_secs, 30);
        assert_eq!(config.payments.simulated_confirm_ms, 1500);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = TillConfig::default();
        config.till.user_id = "  ".into();
        assert!(matches!(config.validate(), Err(TillError::InvalidConfig(_))));

        let mut config = TillConfig::default();
        config.payments.stk_timeout_secs = 0;
        assert!(config.validate().is_err());

        assert!(matches!(
            TillConfig::from_toml("[till\nuser_id ="),
            Err(TillError::ConfigLoadFailed(_))
        ));
    }

    #[test]
    fn test_format_currency() {
        let config = TillConfig::default();
        assert_eq!(config.format_currency(Money::from_major(1200)), "KES 1,200.00");
        assert_eq!(config.format_currency(Money::from_cents(5)), "KES 0.05");
        assert_eq!(
            config.format_currency(Money::from_major_minor(1_234_567, 89)),
            "KES 1,234,567.89"
        );
        assert_eq!(config.format_currency(Money::from_major(-300)), "KES -300.00");
    }

    #[test]
    fn test_toml_round_trip_sections() {
        let toml_str = toml::to_string_pretty(&TillConfig::default()).unwrap();
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[payments]"));
    }
}
