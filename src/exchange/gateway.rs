//! REST gateway for the exchange backend API
//!
//! Pure request/response wrapper: each operation builds a signed request,
//! issues it, and surfaces the raw decoded payload for the normalizer.
//! The gateway never retries and never interprets error envelopes.

use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::auth::generate_bearer_token;
use super::payload::RawReply;
use crate::common::errors::{ClientError, Result};
use crate::config::types::ExchangeConfig;

const CREATE_SUB_ACCOUNT_PATH: &str = "/API/Backend/CreateSubAccount.php";
const ADD_TRANSACTION_PATH: &str = "/API/Backend/AddTransaction.php";
const USER_BALANCES_PATH: &str = "/API/Backend/UserBalancesPortfolioAPI3.php";
const PLACE_ORDER_PATH: &str = "/API/Backend/PlaceOrder.php";
const MODIFY_ORDER_PATH: &str = "/API/Backend/ModifyOrder.php";
const CANCEL_ORDER_PATH: &str = "/API/Backend/CancelOrder.php";
const ORDER_LIST_PATH: &str = "/API/Backend/OrderList.php";

/// Ledger account and voucher type fixed by the upstream wire contract
const TARGET_GL_ACCOUNT: &str = "300 - Customers Balances";
const VOUCHER_TYPE: &str = "G";

/// Direction of a ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOperation {
    Credit,
    Debit,
}

impl LedgerOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOperation::Credit => "credit",
            LedgerOperation::Debit => "debit",
        }
    }
}

impl std::fmt::Display for LedgerOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order side for the trading endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Wire encoding: 1 for buy, -1 for sell
    pub fn as_wire(&self) -> i8 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }
}

/// REST client for the exchange backend API
///
/// Constructed once from configuration and shared by reference; the bearer
/// token is date-dependent and recomputed on every call.
#[derive(Debug, Clone)]
pub struct ExchangeGateway {
    /// HTTP client
    client: Client,
    /// Base URL for the backend API
    base_url: String,
    /// API key sent with every call
    api_key: String,
    /// Secret pattern the per-call bearer token is derived from
    token_pattern: String,
}

impl ExchangeGateway {
    /// Create a new gateway with the default 30s timeout
    pub fn new(config: &ExchangeConfig) -> Result<Self> {
        Self::with_timeout(config, Duration::from_secs(30))
    }

    /// Create a new gateway with a custom per-call timeout
    pub fn with_timeout(config: &ExchangeConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            token_pattern: config.token_pattern.clone(),
        })
    }

    /// Fresh date-salted access token; never cached
    fn access_token(&self) -> String {
        generate_bearer_token(&self.token_pattern)
    }

    /// Create a sub-account under a main account
    #[instrument(skip(self))]
    pub async fn create_sub_account(&self, main_account_id: i64, label: &str) -> Result<RawReply> {
        let url = format!("{}{}", self.base_url, CREATE_SUB_ACCOUNT_PATH);
        debug!("Creating sub-account from: {}", url);

        let request = self.client.get(&url).query(&[
            ("customerid", main_account_id.to_string()),
            ("newUsername", label.to_string()),
            ("apiKey", self.api_key.clone()),
            ("access_token", self.access_token()),
        ]);
        self.send(request).await
    }

    /// Credit or debit a sub-account ledger
    ///
    /// `reference` is the upstream idempotency key: callers must use a fresh
    /// unique token per logical operation, and may reuse one only to retry
    /// the same failed call.
    #[instrument(skip(self))]
    pub async fn add_transaction(
        &self,
        operation: LedgerOperation,
        amount: Decimal,
        currency: &str,
        sub_account_id: i64,
        reference: &str,
    ) -> Result<RawReply> {
        let url = format!("{}{}", self.base_url, ADD_TRANSACTION_PATH);
        debug!("Posting {} transaction to: {}", operation, url);

        let request = self.client.post(&url).query(&[
            ("operation", operation.as_str().to_string()),
            ("amount", amount.to_string()),
            ("force_debit", "0".to_string()),
            ("reference_code", reference.to_string()),
            ("currency_symbol", currency.to_string()),
            ("target_gl_account", TARGET_GL_ACCOUNT.to_string()),
            ("user_id", sub_account_id.to_string()),
            ("voucher_type", VOUCHER_TYPE.to_string()),
            ("apiKey", self.api_key.clone()),
            ("access_token", self.access_token()),
        ]);
        self.send(request).await
    }

    /// Fetch the balances/positions/equity snapshot of a sub-account
    #[instrument(skip(self))]
    pub async fn get_balances(&self, sub_account_id: i64) -> Result<RawReply> {
        let url = format!("{}{}", self.base_url, USER_BALANCES_PATH);
        debug!("Fetching balances from: {}", url);

        let request = self.client.get(&url).query(&[
            ("userId", sub_account_id.to_string()),
            ("apiKey", self.api_key.clone()),
            ("access_token", self.access_token()),
        ]);
        self.send(request).await
    }

    /// Place an order (limit when `price` is set, market otherwise)
    #[instrument(skip(self))]
    pub async fn place_order(
        &self,
        side: OrderSide,
        quantity: Decimal,
        price: Option<Decimal>,
        ticker_id: i64,
    ) -> Result<RawReply> {
        let url = format!("{}{}", self.base_url, PLACE_ORDER_PATH);
        debug!("Placing order via: {}", url);

        let mut params = vec![
            ("apiQuantity", quantity.to_string()),
            ("apiOrderType", side.as_wire().to_string()),
            ("apiTickerId", ticker_id.to_string()),
            ("apiKey", self.api_key.clone()),
            ("access_token", self.access_token()),
        ];
        if let Some(price) = price {
            params.push(("apiPrice", price.to_string()));
        }

        let request = self.client.get(&url).query(&params);
        self.send(request).await
    }

    /// Modify price and quantity of an existing order
    #[instrument(skip(self))]
    pub async fn modify_order(
        &self,
        order_id: &str,
        new_price: Decimal,
        new_quantity: Decimal,
        market_value: Decimal,
        ticker_id: i64,
    ) -> Result<RawReply> {
        let url = format!("{}{}", self.base_url, MODIFY_ORDER_PATH);
        debug!("Modifying order via: {}", url);

        let request = self.client.get(&url).query(&[
            ("orderId", order_id.to_string()),
            ("newPrice", new_price.to_string()),
            ("newQuantity", new_quantity.to_string()),
            ("marketValue", market_value.to_string()),
            ("apiTickerId", ticker_id.to_string()),
            ("apiKey", self.api_key.clone()),
            ("access_token", self.access_token()),
        ]);
        self.send(request).await
    }

    /// Cancel an existing order
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: &str, ticker_id: i64) -> Result<RawReply> {
        let url = format!("{}{}", self.base_url, CANCEL_ORDER_PATH);
        debug!("Cancelling order via: {}", url);

        let request = self.client.get(&url).query(&[
            ("orderId", order_id.to_string()),
            ("mode", "cancel".to_string()),
            ("apiTickerId", ticker_id.to_string()),
            ("apiKey", self.api_key.clone()),
            ("access_token", self.access_token()),
        ]);
        self.send(request).await
    }

    /// List open orders (this endpoint returns a bare JSON array on success)
    #[instrument(skip(self))]
    pub async fn order_list(&self) -> Result<RawReply> {
        let url = format!("{}{}", self.base_url, ORDER_LIST_PATH);
        debug!("Fetching order list from: {}", url);

        let request = self.client.get(&url).query(&[
            ("apiKey", self.api_key.clone()),
            ("access_token", self.access_token()),
        ]);
        self.send(request).await
    }

    /// Issue the request and decode the body without interpreting it.
    ///
    /// Non-2xx responses are not errors at this layer; the raw payload is
    /// surfaced so the normalizer can extract the upstream error envelope.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<RawReply> {
        let response = request.send().await?;
        let http_status = response.status().as_u16();
        let text = response.text().await?;

        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(RawReply { http_status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ExchangeConfig {
        ExchangeConfig {
            base_url: "https://exchange.example.com/".to_string(),
            api_key: "key".to_string(),
            token_pattern: "secret-{Year}{Month}{Day}".to_string(),
            credit_currency: "USDC".to_string(),
            reference_currency: "EUR".to_string(),
        }
    }

    #[test]
    fn test_gateway_creation() {
        let gateway = ExchangeGateway::new(&test_config());
        assert!(gateway.is_ok());
    }

    #[test]
    fn test_url_normalization() {
        let gateway = ExchangeGateway::new(&test_config()).unwrap();
        assert!(!gateway.base_url.ends_with('/'));
    }

    #[test]
    fn test_ledger_operation_wire_values() {
        assert_eq!(LedgerOperation::Credit.as_str(), "credit");
        assert_eq!(LedgerOperation::Debit.as_str(), "debit");
        assert_eq!(OrderSide::Buy.as_wire(), 1);
        assert_eq!(OrderSide::Sell.as_wire(), -1);
    }
}
