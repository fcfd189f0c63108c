//! Integration tests for the exchange gateway and response normalizer
//!
//! These tests run the real gateway against a local mock of the exchange
//! backend, covering the payload shapes the upstream actually produces:
//! the {code, data, errors} envelope with its error variants, the bare
//! array of the order-list endpoint, and non-JSON failure bodies.

use copyvault::config::types::ExchangeConfig;
use copyvault::exchange::gateway::{ExchangeGateway, LedgerOperation, OrderSide};
use copyvault::exchange::normalize;
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create a gateway pointed at the mock server
fn test_gateway(base_url: &str) -> ExchangeGateway {
    let config = ExchangeConfig {
        base_url: base_url.to_string(),
        api_key: "test-api-key".to_string(),
        token_pattern: "secret-{Year}/{Month}/{Day}".to_string(),
        credit_currency: "USDC".to_string(),
        reference_currency: "EUR".to_string(),
    };
    ExchangeGateway::new(&config).expect("Failed to create gateway")
}

// ============================================================================
// Sub-Account Creation Tests
// ============================================================================

#[tokio::test]
async fn test_create_sub_account_success_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/API/Backend/CreateSubAccount.php"))
        .and(query_param("customerid", "1000"))
        .and(query_param("newUsername", "Light CopyTrading"))
        .and(query_param("apiKey", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "R200",
            "data": {"newUserId": 1000470, "newUsername": "Light CopyTrading"},
            "errors": [],
            "extra": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = test_gateway(&server.uri());
    let reply = gateway
        .create_sub_account(1000, "Light CopyTrading")
        .await
        .unwrap();
    let created = normalize::sub_account_response(&reply);

    assert!(created.accepted());
    assert_eq!(created.sub_account_id, Some(1000470));
    assert_eq!(created.sub_account_name, "Light CopyTrading");
}

#[tokio::test]
async fn test_create_sub_account_unknown_customer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/API/Backend/CreateSubAccount.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "R400",
            "data": [],
            "errors": "Customer Does not exist",
            "extra": []
        })))
        .mount(&server)
        .await;

    let gateway = test_gateway(&server.uri());
    let reply = gateway.create_sub_account(9999, "Light CopyTrading").await.unwrap();
    let created = normalize::sub_account_response(&reply);

    assert!(!created.accepted());
    assert!(created.is_error);
    assert_eq!(created.status_code, "R400");
    assert_eq!(created.message, "Customer Does not exist");
}

// ============================================================================
// Ledger Transaction Tests
// ============================================================================

#[tokio::test]
async fn test_add_transaction_credit_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/API/Backend/AddTransaction.php"))
        .and(query_param("operation", "credit"))
        .and(query_param("amount", "250"))
        .and(query_param("currency_symbol", "USDC"))
        .and(query_param("user_id", "1000470"))
        .and(query_param("target_gl_account", "300 - Customers Balances"))
        .and(query_param("voucher_type", "G"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "R200",
            "data": {"orderId": "48485", "message": "Transaction recorded"},
            "errors": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = test_gateway(&server.uri());
    let reply = gateway
        .add_transaction(
            LedgerOperation::Credit,
            dec!(250),
            "USDC",
            1000470,
            "ref-0001",
        )
        .await
        .unwrap();
    let response = normalize::transaction_response(&reply);

    assert!(response.accepted());
    assert_eq!(response.identifier.as_deref(), Some("48485"));
}

#[tokio::test]
async fn test_add_transaction_error_list() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/API/Backend/AddTransaction.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "R403",
            "data": [],
            "errors": ["You are not authorized to view this information"]
        })))
        .mount(&server)
        .await;

    let gateway = test_gateway(&server.uri());
    let reply = gateway
        .add_transaction(LedgerOperation::Debit, dec!(10), "USDT", 1000470, "ref-0002")
        .await
        .unwrap();
    let response = normalize::transaction_response(&reply);

    assert!(!response.accepted());
    assert_eq!(response.status_code, "R403");
    assert_eq!(
        response.message,
        "You are not authorized to view this information"
    );
}

#[tokio::test]
async fn test_add_transaction_gateway_error_body() {
    let server = MockServer::start().await;

    // Reverse proxies occasionally answer with HTML instead of JSON
    Mock::given(method("POST"))
        .and(path("/API/Backend/AddTransaction.php"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let gateway = test_gateway(&server.uri());
    let reply = gateway
        .add_transaction(LedgerOperation::Credit, dec!(1), "USDC", 1000470, "ref-0003")
        .await
        .unwrap();
    let response = normalize::transaction_response(&reply);

    assert!(response.is_error);
    assert_eq!(response.status_code, "502");
    assert_eq!(response.message, "Unable to parse exchange response");
}

// ============================================================================
// Balances Tests
// ============================================================================

#[tokio::test]
async fn test_get_balances_snapshot() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/API/Backend/UserBalancesPortfolioAPI3.php"))
        .and(query_param("userId", "1000470"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "R200",
            "data": {
                "customerId": "1000470",
                "Balances": [
                    {"currencySymbol": "EUR", "availableForTrading": "120.00"},
                    {
                        "currencySymbol": "BTC-X",
                        "availableForTrading": "0.00",
                        "actualCostDefaultCurrency": "100",
                        "AVGCost_DefaultCurrency": "0.5"
                    }
                ],
                "Positions": [],
                "Equity": [{"EquityValue": "115602.04", "CurrencySymbol": "EUR"}],
                "Totals": []
            },
            "errors": []
        })))
        .mount(&server)
        .await;

    let gateway = test_gateway(&server.uri());
    let reply = gateway.get_balances(1000470).await.unwrap();
    let snapshot = normalize::balances_response(&reply);

    assert!(snapshot.accepted());
    assert_eq!(snapshot.customer_id, "1000470");
    assert_eq!(snapshot.equity_value().unwrap(), dec!(115602.04));
    // sentinel "0.00" balance reconstructs the holding from cost basis
    assert_eq!(snapshot.balances[1].liquidation_quantity().unwrap(), dec!(50));
}

// ============================================================================
// Order Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_order_list_returns_bare_array() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/API/Backend/OrderList.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"orderId": "1"}, {"orderId": "2"}])),
        )
        .mount(&server)
        .await;

    let gateway = test_gateway(&server.uri());
    let reply = gateway.order_list().await.unwrap();
    let response = normalize::order_list_response(&reply);

    assert!(!response.is_error);
    assert_eq!(response.status_code, "R200");
    assert!(response.message.contains("orderId"));
}

#[tokio::test]
async fn test_place_order_market_omits_price() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/API/Backend/PlaceOrder.php"))
        .and(query_param("apiQuantity", "2"))
        .and(query_param("apiOrderType", "-1"))
        .and(query_param("apiTickerId", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "R200",
            "data": {"orderId": "48490", "message": "Order placed"},
            "errors": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = test_gateway(&server.uri());
    let reply = gateway
        .place_order(OrderSide::Sell, dec!(2), None, 42)
        .await
        .unwrap();
    let response = normalize::transaction_response(&reply);

    assert!(response.accepted());
    assert_eq!(response.identifier.as_deref(), Some("48490"));
}

#[tokio::test]
async fn test_cancel_order_plain_text_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/API/Backend/CancelOrder.php"))
        .and(query_param("orderId", "48484"))
        .and(query_param("mode", "cancel"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Success: Order #48484 has been cancelled successfully"),
        )
        .mount(&server)
        .await;

    let gateway = test_gateway(&server.uri());
    let reply = gateway.cancel_order("48484", 42).await.unwrap();
    let response = normalize::cancel_order_response(&reply, "48484");

    assert!(!response.is_error);
    assert_eq!(response.identifier.as_deref(), Some("48484"));
    assert!(response.message.contains("cancelled"));
}
