use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Payment provider rejected the request: {0}")]
    Rejected(String),

    #[error("Payment session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Payment provider unreachable: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub description: String,
    pub amount_cents: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub line_items: Vec<LineItem>,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
    pub customer_email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl CreateSessionRequest {
    pub fn total_cents(&self) -> i64 {
        self.line_items
            .iter()
            .map(|item| item.amount_cents * i64::from(item.quantity))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub session_id: String,
    pub paid: bool,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_intent_id: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl PaymentVerification {
    pub fn amount(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub id: String,
    pub status: String,
    pub amount_cents: Option<i64>,
}

/// Hosted checkout provider. Card data never passes through this service.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionHandle, PaymentError>;

    async fn verify(&self, session_id: &str) -> Result<PaymentVerification, PaymentError>;

    /// Refunds a captured payment. `None` refunds the full amount.
    async fn refund(&self, payment_intent_id: &str, amount_cents: Option<i64>) -> Result<RefundReceipt, PaymentError>;
}

pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_are_rounded() {
        assert_eq!(to_cents(250.0), 25000);
        assert_eq!(to_cents(19.99), 1999);
        assert_eq!(to_cents(0.1 + 0.2), 30);
    }
}
