//! Application configuration.
//!
//! Loaded once at startup from a TOML file, then overlaid with environment
//! variables named `DRB__SECTION__FIELD`. Nothing is re-read afterwards.

use config::{Config, Environment, File, FileFormat};
use drb_core::Price;
use drb_gateway::GatewayConfig;
use drb_position::ControllerConfig;
use drb_telemetry::LogConfig;
use drb_ws::{ConnectionConfig, Credentials};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DRB";

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============================================================================
// Exchange
// ============================================================================

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_instrument")]
    pub instrument: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Wait for the liveness pong.
    #[serde(default = "default_liveness_timeout_ms")]
    pub liveness_timeout_ms: u64,
}

fn default_ws_url() -> String {
    "wss://test.deribit.com/ws/api/v2".to_string()
}

fn default_instrument() -> String {
    "BTC-PERPETUAL".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_liveness_timeout_ms() -> u64 {
    1000
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            instrument: default_instrument(),
            client_id: String::new(),
            client_secret: String::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            liveness_timeout_ms: default_liveness_timeout_ms(),
        }
    }
}

impl fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("ws_url", &self.ws_url)
            .field("instrument", &self.instrument)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("liveness_timeout_ms", &self.liveness_timeout_ms)
            .finish()
    }
}

// ============================================================================
// Trading
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Pause between outer ticks.
    #[serde(default = "default_iteration_interval_ms")]
    pub iteration_interval_ms: u64,
    /// Added to the best offer on entry.
    #[serde(default = "default_price_indent")]
    pub price_indent: Decimal,
    /// Minimum spacing between order attempts.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Wait after an accepted order before reading it back.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_iteration_interval_ms() -> u64 {
    5000
}

fn default_price_indent() -> Decimal {
    Decimal::from(5)
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_settle_delay_ms() -> u64 {
    5000
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            iteration_interval_ms: default_iteration_interval_ms(),
            price_indent: default_price_indent(),
            cooldown_secs: default_cooldown_secs(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl TradingConfig {
    pub fn iteration_interval(&self) -> Duration {
        Duration::from_millis(self.iteration_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

// ============================================================================
// Display / Logging
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Clear the terminal before each status block.
    #[serde(default)]
    pub clear_console: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,
    #[serde(default = "default_log_path")]
    pub path: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_log_path() -> String {
    "drb_robot_log.txt".to_string()
}

fn default_log_level() -> String {
    "info,drb=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            path: default_log_path(),
            level: default_log_level(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl AppConfig {
    /// Load from a TOML file (optional) plus `DRB__*` environment overrides.
    pub fn load(path: &str) -> AppResult<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: &str, prefix: &str) -> AppResult<Self> {
        let config = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parse a TOML document without environment overrides.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Reject values the robot cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        let exchange = &self.exchange;
        if !(exchange.ws_url.starts_with("ws://") || exchange.ws_url.starts_with("wss://")) {
            return Err(AppError::Config(format!(
                "exchange.ws_url must be a ws:// or wss:// URL, got {:?}",
                exchange.ws_url
            )));
        }
        if exchange.instrument.trim().is_empty() {
            return Err(AppError::Config("exchange.instrument is empty".to_string()));
        }
        if !self.credentials().is_complete() {
            return Err(AppError::Config(
                "exchange.client_id and exchange.client_secret are required".to_string(),
            ));
        }
        if exchange.connect_timeout_ms == 0 || exchange.liveness_timeout_ms == 0 {
            return Err(AppError::Config("exchange timeouts must be positive".to_string()));
        }
        if self.trading.iteration_interval_ms == 0 {
            return Err(AppError::Config(
                "trading.iteration_interval_ms must be positive".to_string(),
            ));
        }
        if self.trading.cooldown_secs == 0 {
            return Err(AppError::Config("trading.cooldown_secs must be positive".to_string()));
        }
        if self.trading.price_indent.is_sign_negative() {
            return Err(AppError::Config("trading.price_indent must not be negative".to_string()));
        }
        Ok(())
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.exchange.ws_url.clone(),
            connect_timeout_ms: self.exchange.connect_timeout_ms,
            liveness_timeout_ms: self.exchange.liveness_timeout_ms,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.exchange.client_id, &self.exchange.client_secret)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            instrument: self.exchange.instrument.clone(),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            price_indent: Price::new(self.trading.price_indent),
            settle_delay: self.trading.settle_delay(),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.logging.enabled,
            path: self.logging.path.clone(),
            level: self.logging.level.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn with_credentials() -> AppConfig {
        let mut config = AppConfig::default();
        config.exchange.client_id = "id".to_string();
        config.exchange.client_secret = "secret".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.exchange.instrument, "BTC-PERPETUAL");
        assert_eq!(config.trading.cooldown(), Duration::from_secs(60));
        assert_eq!(config.trading.iteration_interval(), Duration::from_secs(5));
        assert_eq!(config.trading.price_indent, dec!(5));
        assert!(config.logging.enabled);
        assert!(!config.display.clear_console);
    }

    #[test]
    fn test_default_requires_credentials() {
        assert!(AppConfig::default().validate().is_err());
        assert!(with_credentials().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = with_credentials();
        config.trading.cooldown_secs = 0;
        assert!(config.validate().is_err());

        let mut config = with_credentials();
        config.trading.price_indent = dec!(-1);
        assert!(config.validate().is_err());

        let mut config = with_credentials();
        config.exchange.ws_url = "https://test.deribit.com".to_string();
        assert!(config.validate().is_err());

        let mut config = with_credentials();
        config.trading.iteration_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [exchange]
            client_id = "abc"

            [trading]
            cooldown_secs = 30
            price_indent = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.exchange.client_id, "abc");
        assert_eq!(config.exchange.ws_url, default_ws_url());
        assert_eq!(config.trading.cooldown_secs, 30);
        assert_eq!(config.trading.price_indent, dec!(2.5));
        assert_eq!(config.trading.settle_delay_ms, 5000);
        assert_eq!(config.logging.path, "drb_robot_log.txt");
    }

    #[test]
    fn test_env_overrides_file() {
        std::env::set_var("DRBCFGTEST__EXCHANGE__CLIENT_SECRET", "from-env");
        std::env::set_var("DRBCFGTEST__TRADING__COOLDOWN_SECS", "90");

        let config =
            AppConfig::load_with_prefix("/nonexistent/drb/config.toml", "DRBCFGTEST").unwrap();

        assert_eq!(config.exchange.client_secret, "from-env");
        assert_eq!(config.trading.cooldown_secs, 90);
        assert_eq!(config.exchange.instrument, "BTC-PERPETUAL");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", with_credentials());
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_config_serialization() {
        let config = with_credentials();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("ws_url"));
        assert!(toml_str.contains("cooldown_secs"));
    }

    #[test]
    fn test_shipped_default_file_parses() {
        let content = include_str!("../../../config/default.toml");
        let config = AppConfig::from_toml_str(content).unwrap();
        assert_eq!(config.exchange, ExchangeConfig::default());
        assert_eq!(config.trading, TradingConfig::default());
    }
}
