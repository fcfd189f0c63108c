//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{ClientError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP_)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    // Add default config file if it exists
    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    // Add environment variables with APP_ prefix
    builder = builder.add_source(
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ClientError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ClientError::Configuration(e.to_string()))
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    let require = |key: &str| {
        std::env::var(key)
            .map_err(|_| ClientError::Configuration(format!("missing environment variable {key}")))
    };

    let exchange = super::types::ExchangeConfig {
        base_url: require("EXCHANGE_BASE_URL")?,
        api_key: require("EXCHANGE_API_KEY")?,
        token_pattern: require("EXCHANGE_TOKEN_PATTERN")?,
        credit_currency: std::env::var("EXCHANGE_CREDIT_CURRENCY")
            .unwrap_or_else(|_| "USDC".to_string()),
        reference_currency: std::env::var("EXCHANGE_REFERENCE_CURRENCY")
            .unwrap_or_else(|_| "EUR".to_string()),
    };

    Ok(AppConfig {
        exchange,
        report: super::types::ReportConfig::default(),
        settings: super::types::AppSettings::default(),
    })
}
