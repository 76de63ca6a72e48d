// libs/appointment-cell/src/services/client.rs
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use payment_cell::models::{CheckoutSession, PaymentConfirmation};
use shared_models::appointment::Appointment;
use shared_models::provider::Provider;
use shared_utils::Session;

use crate::models::{BookAppointmentRequest, BookingError};
use crate::services::backend::BookingBackend;

/// Booking backend that talks to a running API over HTTP with the session's
/// bearer token.
pub struct HttpBookingBackend {
    client: Client,
    base_url: String,
}

impl HttpBookingBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn headers(&self, session: Option<&Session>) -> Result<HeaderMap, BookingError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(session) = session {
            let value = HeaderValue::from_str(&format!("Bearer {}", session.bearer()?))
                .map_err(|_| BookingError::Auth("Session token is not a valid header".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn status_error(status: StatusCode, message: String) -> BookingError {
        match status {
            StatusCode::BAD_REQUEST => BookingError::Validation(message),
            StatusCode::UNAUTHORIZED => BookingError::Auth(message),
            StatusCode::FORBIDDEN => BookingError::Forbidden(message),
            StatusCode::NOT_FOUND => BookingError::NotFound(message),
            StatusCode::CONFLICT => BookingError::Conflict(message),
            StatusCode::PAYMENT_REQUIRED => BookingError::Payment(message),
            _ => BookingError::Backend(format!("{} ({})", message, status)),
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
        body: Option<Value>,
    ) -> Result<Value, BookingError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Booking API {} {}", method, url);

        let mut request = self.client.request(method, &url).headers(self.headers(session)?);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BookingError::Backend(e.to_string()))?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let message = payload["error"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request to {} failed", path));
            error!("Booking API error ({}): {}", status, message);
            return Err(Self::status_error(status, message));
        }
        Ok(payload)
    }

    fn field<T: DeserializeOwned>(payload: &Value, key: &str) -> Result<T, BookingError> {
        serde_json::from_value(payload[key].clone())
            .map_err(|e| BookingError::Backend(format!("Unexpected `{}` in response: {}", key, e)))
    }
}

#[async_trait]
impl BookingBackend for HttpBookingBackend {
    async fn fetch_provider(&self, _session: &Session, provider_id: Uuid) -> Result<Provider, BookingError> {
        let path = format!("/providers/{}", provider_id);
        let payload = self.call(Method::GET, &path, None, None).await?;
        Self::field(&payload, "provider")
    }

    async fn book(&self, session: &Session, request: BookAppointmentRequest) -> Result<Appointment, BookingError> {
        let body = serde_json::to_value(&request)
            .map_err(|e| BookingError::Validation(e.to_string()))?;
        let payload = self
            .call(Method::POST, "/appointments", Some(session), Some(body))
            .await?;
        Self::field(&payload, "appointment")
    }

    async fn create_payment_session(
        &self,
        session: &Session,
        appointment_ids: &[Uuid],
    ) -> Result<CheckoutSession, BookingError> {
        let payload = self
            .call(
                Method::POST,
                "/payments/sessions",
                Some(session),
                Some(json!({ "appointment_ids": appointment_ids })),
            )
            .await?;

        Ok(CheckoutSession {
            session_id: Self::field(&payload, "session_id")?,
            url: Self::field(&payload, "session_url")?,
            amount: Self::field(&payload, "amount")?,
            currency: Self::field(&payload, "currency")?,
            appointment_ids: Self::field(&payload, "appointment_ids")?,
        })
    }

    async fn verify_payment(&self, session: &Session, session_id: &str) -> Result<PaymentConfirmation, BookingError> {
        let payload = self
            .call(
                Method::POST,
                "/payments/verify",
                Some(session),
                Some(json!({ "session_id": session_id })),
            )
            .await?;
        Self::field(&payload, "confirmation")
    }
}
