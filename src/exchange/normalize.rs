//! Response normalizer
//!
//! Pure functions, one per endpoint shape, mapping raw exchange payloads
//! into the two uniform result shapes (`StandardResponse`, `BalancesSnapshot`)
//! so callers never branch on raw payload shape. Malformed payloads become
//! `is_error = true` with a synthetic message; nothing here panics.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::payload::{RawData, RawEnvelope, RawPayload, RawReply};
use crate::common::errors::{ClientError, Result};

/// Upstream success code
pub const CODE_OK: &str = "R200";

const UNPARSEABLE: &str = "Unable to parse exchange response";

/// Normalized result of any non-balances exchange call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardResponse {
    /// Raw upstream status code, passed through (e.g. "R200", or the HTTP
    /// status for endpoints without an envelope)
    pub status_code: String,
    /// Order/transaction/account identifier when the endpoint returns one
    pub identifier: Option<String>,
    /// Upstream message text, success or error
    pub message: String,
    pub is_error: bool,
}

impl StandardResponse {
    /// Whether the upstream accepted the operation.
    ///
    /// Enveloped responses carry the "R200" code; the envelope-less
    /// modify/cancel endpoints carry their numeric HTTP status instead.
    pub fn accepted(&self) -> bool {
        if self.is_error {
            return false;
        }
        self.status_code == CODE_OK
            || self
                .status_code
                .parse::<u16>()
                .is_ok_and(|status| (200..300).contains(&status))
    }

    fn unparseable(status_code: impl Into<String>) -> Self {
        Self {
            status_code: status_code.into(),
            identifier: None,
            message: UNPARSEABLE.to_string(),
            is_error: true,
        }
    }
}

/// Normalized result of a sub-account creation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAccountCreation {
    pub status_code: String,
    pub sub_account_id: Option<i64>,
    pub sub_account_name: String,
    pub message: String,
    pub is_error: bool,
}

impl SubAccountCreation {
    pub fn accepted(&self) -> bool {
        !self.is_error && self.status_code == CODE_OK && self.sub_account_id.is_some()
    }
}

/// One currency balance of a sub-account
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyBalance {
    #[serde(rename = "currencySymbol")]
    pub currency_symbol: String,
    /// Reported quantity available for trading, as a string
    #[serde(rename = "availableForTrading", default)]
    pub available_for_trading: String,
    /// Accrued cost basis in the default currency
    #[serde(rename = "actualCostDefaultCurrency", default)]
    pub actual_cost: String,
    /// Average cost ratio in the default currency
    #[serde(rename = "AVGCost_DefaultCurrency", default)]
    pub average_cost_ratio: String,
}

/// Exchange quirk: a nonzero position can report exactly "0.00" available
/// while still holding accrued cost basis.
const ZERO_AVAILABLE_SENTINEL: &str = "0.00";

impl CurrencyBalance {
    /// Quantity to debit when liquidating this balance.
    ///
    /// When the reported available quantity is the "0.00" sentinel, the real
    /// holding is reconstructed as actual_cost x average_cost_ratio instead
    /// of trusting the reported amount.
    pub fn liquidation_quantity(&self) -> Result<Decimal> {
        if self.available_for_trading == ZERO_AVAILABLE_SENTINEL {
            let cost = parse_decimal(&self.actual_cost, "actualCostDefaultCurrency")?;
            let ratio = parse_decimal(&self.average_cost_ratio, "AVGCost_DefaultCurrency")?;
            Ok(cost * ratio)
        } else {
            parse_decimal(&self.available_for_trading, "availableForTrading")
        }
    }
}

/// One equity line of the balances payload
#[derive(Debug, Clone, Deserialize)]
pub struct EquityEntry {
    #[serde(rename = "EquityValue")]
    pub equity_value: String,
    #[serde(rename = "CurrencySymbol", default)]
    pub currency_symbol: String,
}

/// Normalized balances snapshot of a sub-account
///
/// Transient: fetched fresh on every read, never persisted.
#[derive(Debug, Clone)]
pub struct BalancesSnapshot {
    pub status_code: String,
    pub customer_id: String,
    pub balances: Vec<CurrencyBalance>,
    pub positions: Vec<Value>,
    pub equity: Vec<EquityEntry>,
    pub totals: Vec<Value>,
    pub error: String,
    pub is_error: bool,
}

impl BalancesSnapshot {
    pub fn accepted(&self) -> bool {
        !self.is_error && self.status_code == CODE_OK
    }

    /// Equity total in the exchange reference currency
    pub fn equity_value(&self) -> Result<Decimal> {
        let entry = self
            .equity
            .first()
            .ok_or_else(|| ClientError::InvalidResponse("missing Equity entry".to_string()))?;
        parse_decimal(&entry.equity_value, "EquityValue")
    }

    fn failed(status_code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status_code: status_code.into(),
            customer_id: String::new(),
            balances: Vec::new(),
            positions: Vec::new(),
            equity: Vec::new(),
            totals: Vec::new(),
            error: error.into(),
            is_error: true,
        }
    }
}

/// Typed success `data` of the balances endpoint
#[derive(Debug, Clone, Deserialize)]
struct BalancesData {
    #[serde(rename = "customerId", default)]
    customer_id: String,
    #[serde(rename = "Balances", default)]
    balances: Vec<CurrencyBalance>,
    #[serde(rename = "Positions", default)]
    positions: Vec<Value>,
    #[serde(rename = "Equity", default)]
    equity: Vec<EquityEntry>,
    #[serde(rename = "Totals", default)]
    totals: Vec<Value>,
}

/// Normalize a ledger transaction (credit/debit) response
pub fn transaction_response(reply: &RawReply) -> StandardResponse {
    match RawPayload::classify(&reply.body) {
        RawPayload::Envelope(env) => envelope_to_standard(&env),
        _ => StandardResponse::unparseable(reply.http_status.to_string()),
    }
}

/// Normalize a sub-account creation response
pub fn sub_account_response(reply: &RawReply) -> SubAccountCreation {
    let env = match RawPayload::classify(&reply.body) {
        RawPayload::Envelope(env) => env,
        _ => {
            return SubAccountCreation {
                status_code: reply.http_status.to_string(),
                sub_account_id: None,
                sub_account_name: String::new(),
                message: UNPARSEABLE.to_string(),
                is_error: true,
            }
        }
    };

    let status_code = env.code.clone().unwrap_or_default();
    match env.data.as_object() {
        Some(data) => SubAccountCreation {
            status_code,
            sub_account_id: field_as_i64(data.get("newUserId")),
            sub_account_name: field_as_string(data.get("newUsername")),
            message: field_as_string(data.get("message")),
            is_error: false,
        },
        None => SubAccountCreation {
            status_code,
            sub_account_id: None,
            sub_account_name: String::new(),
            message: env.errors.first_message().unwrap_or_else(|| UNPARSEABLE.to_string()),
            is_error: true,
        },
    }
}

/// Normalize a balances query response
pub fn balances_response(reply: &RawReply) -> BalancesSnapshot {
    let env = match RawPayload::classify(&reply.body) {
        RawPayload::Envelope(env) => env,
        _ => return BalancesSnapshot::failed(reply.http_status.to_string(), UNPARSEABLE),
    };

    let status_code = env.code.clone().unwrap_or_default();
    match env.data.as_object() {
        Some(data) => {
            let data = Value::Object(data.clone());
            match serde_json::from_value::<BalancesData>(data) {
                Ok(parsed) => BalancesSnapshot {
                    status_code,
                    customer_id: parsed.customer_id,
                    balances: parsed.balances,
                    positions: parsed.positions,
                    equity: parsed.equity,
                    totals: parsed.totals,
                    error: String::new(),
                    is_error: false,
                },
                Err(_) => BalancesSnapshot::failed(status_code, UNPARSEABLE),
            }
        }
        None => {
            let message = env.errors.first_message().unwrap_or_else(|| UNPARSEABLE.to_string());
            BalancesSnapshot::failed(status_code, message)
        }
    }
}

/// Normalize an order-list response
///
/// This endpoint atypically returns a bare JSON array on success.
pub fn order_list_response(reply: &RawReply) -> StandardResponse {
    match RawPayload::classify(&reply.body) {
        RawPayload::BareList(items) => StandardResponse {
            status_code: CODE_OK.to_string(),
            identifier: None,
            message: Value::Array(items).to_string(),
            is_error: false,
        },
        RawPayload::Envelope(env) => envelope_to_standard(&env),
        RawPayload::Other(_) => StandardResponse::unparseable(reply.http_status.to_string()),
    }
}

/// Normalize an order-modify response (no envelope; HTTP-status driven)
pub fn modify_order_response(reply: &RawReply, order_id: &str) -> StandardResponse {
    http_driven_response(reply, order_id)
}

/// Normalize an order-cancel response (no envelope; HTTP-status driven)
pub fn cancel_order_response(reply: &RawReply, order_id: &str) -> StandardResponse {
    http_driven_response(reply, order_id)
}

fn http_driven_response(reply: &RawReply, order_id: &str) -> StandardResponse {
    let status_code = reply.http_status.to_string();
    if reply.is_http_success() {
        let message = match &reply.body {
            Value::Object(map) => field_as_string(map.get("message")),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        StandardResponse {
            status_code,
            identifier: Some(order_id.to_string()),
            message,
            is_error: false,
        }
    } else {
        let message = match RawPayload::classify(&reply.body) {
            RawPayload::Envelope(env) => env
                .errors
                .first_message()
                .unwrap_or_else(|| UNPARSEABLE.to_string()),
            RawPayload::Other(Value::String(text)) => text,
            _ => UNPARSEABLE.to_string(),
        };
        StandardResponse {
            status_code,
            identifier: Some(order_id.to_string()),
            message,
            is_error: true,
        }
    }
}

fn envelope_to_standard(env: &RawEnvelope) -> StandardResponse {
    let status_code = env.code.clone().unwrap_or_default();
    match &env.data {
        RawData::Object(data) => StandardResponse {
            status_code,
            identifier: data.get("orderId").map(field_to_string),
            message: field_as_string(data.get("message")),
            is_error: false,
        },
        RawData::List(_) => StandardResponse {
            identifier: env.errors.order_id(),
            message: env
                .errors
                .first_message()
                .unwrap_or_else(|| UNPARSEABLE.to_string()),
            status_code,
            is_error: true,
        },
    }
}

fn parse_decimal(text: &str, field: &str) -> Result<Decimal> {
    text.parse()
        .map_err(|e| ClientError::InvalidResponse(format!("Invalid {}: {}", field, e)))
}

fn field_as_string(value: Option<&Value>) -> String {
    value.map(field_to_string).unwrap_or_default()
}

fn field_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn field_as_i64(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}
