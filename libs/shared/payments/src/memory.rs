use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::gateway::{
    CreateSessionRequest, PaymentError, PaymentGateway, PaymentVerification, RefundReceipt,
    SessionHandle,
};

#[derive(Debug, Clone)]
struct StoredSession {
    request: CreateSessionRequest,
    paid: bool,
    payment_intent_id: Option<String>,
}

/// Gateway that keeps sessions in memory. Used when Stripe is not configured
/// and by tests, which complete payments with [`InMemoryGateway::mark_paid`].
#[derive(Default)]
pub struct InMemoryGateway {
    sessions: RwLock<HashMap<String, StoredSession>>,
    refunds: RwLock<Vec<RefundReceipt>>,
    refused_intents: RwLock<Vec<String>>,
    reject_sessions: AtomicBool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the customer finishing checkout.
    pub async fn mark_paid(&self, session_id: &str) -> Option<String> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;
        session.paid = true;
        let intent = session
            .payment_intent_id
            .get_or_insert_with(|| format!("pi_{}", Uuid::new_v4().simple()))
            .clone();
        Some(intent)
    }

    pub fn reject_new_sessions(&self, reject: bool) {
        self.reject_sessions.store(reject, Ordering::SeqCst);
    }

    /// Makes refunds for this intent fail.
    pub async fn refuse_refunds_for(&self, payment_intent_id: &str) {
        self.refused_intents.write().await.push(payment_intent_id.to_string());
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn session_request(&self, session_id: &str) -> Option<CreateSessionRequest> {
        self.sessions.read().await.get(session_id).map(|s| s.request.clone())
    }

    pub async fn refunds(&self) -> Vec<RefundReceipt> {
        self.refunds.read().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<SessionHandle, PaymentError> {
        if self.reject_sessions.load(Ordering::SeqCst) {
            return Err(PaymentError::Rejected("Session creation disabled".to_string()));
        }

        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        debug!("In-memory checkout session {} for {} cents", id, request.total_cents());

        self.sessions.write().await.insert(
            id.clone(),
            StoredSession {
                request,
                paid: false,
                payment_intent_id: None,
            },
        );

        Ok(SessionHandle {
            url: format!("https://checkout.local/pay/{}", id),
            id,
        })
    }

    async fn verify(&self, session_id: &str) -> Result<PaymentVerification, PaymentError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| PaymentError::SessionNotFound(session_id.to_string()))?;

        Ok(PaymentVerification {
            session_id: session_id.to_string(),
            paid: session.paid,
            amount_cents: session.request.total_cents(),
            currency: session.request.currency.clone(),
            payment_intent_id: session.payment_intent_id.clone(),
            metadata: session.request.metadata.clone(),
        })
    }

    async fn refund(&self, payment_intent_id: &str, amount_cents: Option<i64>) -> Result<RefundReceipt, PaymentError> {
        if self.refused_intents.read().await.iter().any(|i| i == payment_intent_id) {
            return Err(PaymentError::Rejected(format!("Refund refused for {}", payment_intent_id)));
        }

        let receipt = RefundReceipt {
            id: format!("re_{}", Uuid::new_v4().simple()),
            status: "succeeded".to_string(),
            amount_cents,
        };
        self.refunds.write().await.push(receipt.clone());
        Ok(receipt)
    }
}
