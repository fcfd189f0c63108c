//! Raw exchange payload shapes
//!
//! The exchange backend is not uniform: most endpoints wrap results in a
//! `{code, data, errors, extra}` envelope, but `data` degrades to an empty
//! array on failure, `errors` is variously a bare string, a list of strings,
//! or a keyed object, and the order-list endpoint returns a bare JSON array
//! on success. These types enumerate every observed shape explicitly so the
//! normalizer can do exhaustive case analysis instead of probing fields.

use serde::Deserialize;
use serde_json::Value;

/// What came back from the exchange, including the transport status code.
///
/// The gateway never interprets the payload; it hands this to the normalizer.
#[derive(Debug, Clone)]
pub struct RawReply {
    /// HTTP status of the upstream response
    pub http_status: u16,
    /// Decoded body; a JSON string value if the body was not valid JSON
    pub body: Value,
}

impl RawReply {
    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }
}

/// Top-level payload shape
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPayload {
    /// The standard `{code, data, errors}` envelope
    Envelope(RawEnvelope),
    /// A bare array body (order-list endpoint success)
    BareList(Vec<Value>),
    /// Anything else; normalizes to an "unable to parse" error
    Other(Value),
}

impl RawPayload {
    /// Classify a decoded body. Never fails: unknown shapes land in `Other`.
    pub fn classify(body: &Value) -> RawPayload {
        serde_json::from_value(body.clone()).unwrap_or_else(|_| RawPayload::Other(body.clone()))
    }
}

/// The standard response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    /// Upstream status code, e.g. "R200", "R400", "R403"
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub data: RawData,
    #[serde(default)]
    pub errors: RawErrors,
}

/// The `data` section: an object on success, an empty array on failure
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawData {
    Object(serde_json::Map<String, Value>),
    List(Vec<Value>),
}

impl Default for RawData {
    fn default() -> Self {
        RawData::List(Vec::new())
    }
}

impl RawData {
    /// The populated success object, if any. An empty array counts as absent.
    pub fn as_object(&self) -> Option<&serde_json::Map<String, Value>> {
        match self {
            RawData::Object(map) => Some(map),
            RawData::List(_) => None,
        }
    }

}

/// The `errors` section in its three observed forms
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawErrors {
    /// `"errors": "Customer Does not exist"`
    Text(String),
    /// `"errors": ["You are not authorized ..."]` (empty on success)
    List(Vec<Value>),
    /// `"errors": {"orderId": "...", "message": "..."}`
    Keyed(KeyedError),
}

impl Default for RawErrors {
    fn default() -> Self {
        RawErrors::List(Vec::new())
    }
}

/// Keyed error object used by the order endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct KeyedError {
    #[serde(rename = "orderId", default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RawErrors {
    /// First human-readable error message, across all three forms
    pub fn first_message(&self) -> Option<String> {
        match self {
            RawErrors::Text(text) => Some(text.clone()),
            RawErrors::List(items) => items.first().map(value_as_text),
            RawErrors::Keyed(keyed) => keyed.message.clone(),
        }
    }

    /// Order identifier, present only in the keyed form
    pub fn order_id(&self) -> Option<String> {
        match self {
            RawErrors::Keyed(keyed) => keyed.order_id.clone(),
            _ => None,
        }
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_success_envelope() {
        let body = json!({
            "code": "R200",
            "data": {"orderId": "48485", "message": "Order was placed successfully."},
            "errors": [],
            "extra": []
        });

        match RawPayload::classify(&body) {
            RawPayload::Envelope(env) => {
                assert_eq!(env.code.as_deref(), Some("R200"));
                let data = env.data.as_object().expect("data object");
                assert_eq!(data["orderId"], "48485");
                assert!(env.errors.first_message().is_none());
            }
            other => panic!("expected envelope, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_string_envelope() {
        let body = json!({"code": "R400", "data": [], "errors": "Customer Does not exist", "extra": []});

        match RawPayload::classify(&body) {
            RawPayload::Envelope(env) => {
                assert!(env.data.as_object().is_none());
                assert_eq!(
                    env.errors.first_message().as_deref(),
                    Some("Customer Does not exist")
                );
            }
            other => panic!("expected envelope, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_list_envelope() {
        let body = json!({"code": "R403", "data": [], "errors": ["You are not authorized to view this information"]});

        match RawPayload::classify(&body) {
            RawPayload::Envelope(env) => {
                assert_eq!(env.code.as_deref(), Some("R403"));
                assert_eq!(
                    env.errors.first_message().as_deref(),
                    Some("You are not authorized to view this information")
                );
            }
            other => panic!("expected envelope, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_keyed_error_envelope() {
        let body = json!({
            "code": "R422",
            "data": [],
            "errors": {"orderId": "48485", "message": "Insufficient balance"}
        });

        match RawPayload::classify(&body) {
            RawPayload::Envelope(env) => {
                assert_eq!(env.errors.order_id().as_deref(), Some("48485"));
                assert_eq!(
                    env.errors.first_message().as_deref(),
                    Some("Insufficient balance")
                );
            }
            other => panic!("expected envelope, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_bare_array() {
        let body = json!([{"orderId": "1"}, {"orderId": "2"}]);

        match RawPayload::classify(&body) {
            RawPayload::BareList(items) => assert_eq!(items.len(), 2),
            other => panic!("expected bare list, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_unknown_shape() {
        let body = json!("<html>gateway timeout</html>");

        match RawPayload::classify(&body) {
            RawPayload::Other(value) => assert!(value.is_string()),
            other => panic!("expected other, got {:?}", other),
        }
    }
}
