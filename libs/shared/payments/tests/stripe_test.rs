use std::collections::BTreeMap;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_payments::{
    CreateSessionRequest, LineItem, PaymentError, PaymentGateway, StripeClient,
};

fn config(api_base: &str) -> AppConfig {
    AppConfig {
        supabase_url: String::new(),
        supabase_anon_key: String::new(),
        supabase_service_role_key: String::new(),
        supabase_jwt_secret: String::new(),
        stripe_secret_key: "sk_test_123".to_string(),
        stripe_webhook_secret: "whsec_test".to_string(),
        stripe_api_base: api_base.to_string(),
        frontend_url: "http://localhost:5173".to_string(),
        payment_currency: "usd".to_string(),
        payment_session_ttl_minutes: 30,
        unpaid_appointment_ttl_minutes: 45,
        unpaid_sweep_interval_secs: 300,
        port: 3000,
    }
}

fn session_request() -> CreateSessionRequest {
    let mut metadata = BTreeMap::new();
    metadata.insert("appointment_ids".to_string(), "a,b".to_string());
    CreateSessionRequest {
        line_items: vec![LineItem {
            name: "Appointment For Dr. A".to_string(),
            description: "Appointment Date: 12/3/2025, Time: 10:00 AM".to_string(),
            amount_cents: 25000,
            quantity: 1,
        }],
        currency: "usd".to_string(),
        success_url: "http://localhost:5173/payment-success?success=true&session_id={CHECKOUT_SESSION_ID}".to_string(),
        cancel_url: "http://localhost:5173/my-appointments?cancelled=true".to_string(),
        metadata,
        customer_email: Some("min@example.com".to_string()),
        expires_at: Utc::now() + Duration::minutes(30),
    }
}

#[tokio::test]
async fn create_session_posts_form_with_bearer_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(body_string_contains("line_items%5B0%5D%5Bprice_data%5D%5Bunit_amount%5D=25000"))
        .and(body_string_contains("metadata%5Bappointment_ids%5D=a%2Cb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_1",
            "url": "https://checkout.stripe.com/c/pay/cs_test_1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = StripeClient::new(&config(&mock_server.uri()));
    let handle = client.create_session(session_request()).await.unwrap();

    assert_eq!(handle.id, "cs_test_1");
    assert!(handle.url.contains("cs_test_1"));
}

#[tokio::test]
async fn verify_reads_expanded_intent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_test_1"))
        .and(query_param("expand[]", "payment_intent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_1",
            "payment_status": "paid",
            "amount_total": 25000,
            "currency": "usd",
            "payment_intent": { "id": "pi_123", "status": "succeeded" },
            "metadata": { "user_id": "patient-1" }
        })))
        .mount(&mock_server)
        .await;

    let client = StripeClient::new(&config(&mock_server.uri()));
    let verification = client.verify("cs_test_1").await.unwrap();

    assert!(verification.paid);
    assert_eq!(verification.amount(), 250.0);
    assert_eq!(verification.payment_intent_id.as_deref(), Some("pi_123"));
    assert_eq!(verification.metadata["user_id"], "patient-1");
}

#[tokio::test]
async fn stripe_error_message_is_kept() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Charge has already been refunded." }
        })))
        .mount(&mock_server)
        .await;

    let client = StripeClient::new(&config(&mock_server.uri()));
    let result = client.refund("pi_123", None).await;

    assert_matches!(result, Err(PaymentError::Rejected(msg)) if msg.contains("already been refunded"));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/checkout/sessions/cs_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "message": "No such checkout.session: 'cs_missing'" }
        })))
        .mount(&mock_server)
        .await;

    let client = StripeClient::new(&config(&mock_server.uri()));
    let result = client.verify("cs_missing").await;

    assert_matches!(result, Err(PaymentError::SessionNotFound(_)));
}
