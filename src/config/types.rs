//! Configuration types

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Exchange-specific configuration
    pub exchange: ExchangeConfig,
    /// Reporting/reconciliation tuning
    #[serde(default)]
    pub report: ReportConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Exchange platform configuration
///
/// Credentials live here, never as literals in code; the gateway is built
/// once from this struct and injected everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Base URL for the exchange REST API
    pub base_url: String,
    /// API key sent with every backend call
    pub api_key: String,
    /// Secret access-token pattern with {Year}/{Month}/{Day} placeholders.
    /// The bearer token is recomputed per call because it is date-dependent.
    pub token_pattern: String,
    /// Currency credited on capital top-ups
    #[serde(default = "default_credit_currency")]
    pub credit_currency: String,
    /// Reference fiat currency, never liquidated on stop
    #[serde(default = "default_reference_currency")]
    pub reference_currency: String,
}

fn default_credit_currency() -> String {
    "USDC".to_string()
}

fn default_reference_currency() -> String {
    "EUR".to_string()
}

/// Reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Multiplier from the exchange reference currency to the display currency
    #[serde(default = "default_equity_fx_rate")]
    pub equity_fx_rate: String,
    /// Absolute P&L deadband: values in (-deadband, 0) are reported as 0
    #[serde(default = "default_pnl_deadband")]
    pub pnl_deadband: String,
    /// Per-strategy ROI deadband in percentage points
    #[serde(default = "default_roi_deadband")]
    pub roi_deadband: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            equity_fx_rate: default_equity_fx_rate(),
            pnl_deadband: default_pnl_deadband(),
            roi_deadband: default_roi_deadband(),
        }
    }
}

fn default_equity_fx_rate() -> String {
    "1.08".to_string()
}

fn default_pnl_deadband() -> String {
    "3.0".to_string()
}

fn default_roi_deadband() -> String {
    "0.3".to_string()
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Request timeout in seconds for every exchange call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout() -> u64 {
    30
}
