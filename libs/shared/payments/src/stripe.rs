use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::gateway::{
    CreateSessionRequest, PaymentError, PaymentGateway, PaymentVerification, RefundReceipt,
    SessionHandle,
};

/// Stripe Checkout over the form-encoded REST API.
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_status: String,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    payment_intent: Option<Value>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RefundObject {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    amount: Option<i64>,
}

/// Stripe returns the intent as an id or, when expanded, as an object.
fn intent_id(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(id) => Some(id),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn session_form(request: &CreateSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("expires_at".to_string(), request.expires_at.timestamp().to_string()),
    ];

    if let Some(email) = &request.customer_email {
        form.push(("customer_email".to_string(), email.clone()));
    }

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        form.push((format!("{}[price_data][currency]", prefix), request.currency.clone()));
        form.push((format!("{}[price_data][product_data][name]", prefix), item.name.clone()));
        form.push((
            format!("{}[price_data][product_data][description]", prefix),
            item.description.clone(),
        ));
        form.push((format!("{}[price_data][unit_amount]", prefix), item.amount_cents.to_string()));
        form.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
    }

    for (key, value) in &request.metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }

    form
}

impl StripeClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: config.stripe_secret_key.clone(),
        }
    }

    async fn read_error(response: Response) -> PaymentError {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body["error"]["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status));
        error!("Stripe error ({}): {}", status, message);

        if status == StatusCode::NOT_FOUND {
            PaymentError::SessionNotFound(message)
        } else {
            PaymentError::Rejected(message)
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionHandle, PaymentError> {
        debug!("Creating checkout session for {} cents", request.total_cents());

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&session_form(&request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let session: SessionObject = response.json().await?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::Rejected("Checkout session has no redirect url".to_string()))?;

        info!("Checkout session {} created", session.id);
        Ok(SessionHandle { id: session.id, url })
    }

    async fn verify(&self, session_id: &str) -> Result<PaymentVerification, PaymentError> {
        debug!("Retrieving checkout session {}", session_id);

        let response = self
            .client
            .get(format!("{}/v1/checkout/sessions/{}", self.api_base, session_id))
            .bearer_auth(&self.secret_key)
            .query(&[("expand[]", "payment_intent")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let session: SessionObject = response.json().await?;
        Ok(PaymentVerification {
            paid: session.payment_status == "paid",
            amount_cents: session.amount_total.unwrap_or(0),
            currency: session.currency.unwrap_or_default(),
            payment_intent_id: intent_id(session.payment_intent),
            metadata: session.metadata,
            session_id: session.id,
        })
    }

    async fn refund(&self, payment_intent_id: &str, amount_cents: Option<i64>) -> Result<RefundReceipt, PaymentError> {
        info!("Refunding payment intent {}", payment_intent_id);

        let mut form = vec![("payment_intent".to_string(), payment_intent_id.to_string())];
        if let Some(amount) = amount_cents {
            form.push(("amount".to_string(), amount.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/v1/refunds", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let refund: RefundObject = response.json().await?;
        Ok(RefundReceipt {
            id: refund.id,
            status: refund.status,
            amount_cents: refund.amount,
        })
    }
}
