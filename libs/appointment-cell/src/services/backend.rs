// libs/appointment-cell/src/services/backend.rs
use async_trait::async_trait;
use uuid::Uuid;

use payment_cell::models::{CheckoutSession, PaymentConfirmation};
use payment_cell::services::CheckoutService;
use provider_cell::services::ProviderService;
use shared_models::appointment::Appointment;
use shared_models::provider::Provider;
use shared_utils::{AppState, Session};

use crate::models::{BookAppointmentRequest, BookingError};
use crate::services::booking::BookingService;

/// Operations the booking orchestrator needs from the platform. Implemented
/// in-process over the services and over the REST API.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    async fn fetch_provider(&self, session: &Session, provider_id: Uuid) -> Result<Provider, BookingError>;

    async fn book(&self, session: &Session, request: BookAppointmentRequest) -> Result<Appointment, BookingError>;

    async fn create_payment_session(
        &self,
        session: &Session,
        appointment_ids: &[Uuid],
    ) -> Result<CheckoutSession, BookingError>;

    async fn verify_payment(&self, session: &Session, session_id: &str) -> Result<PaymentConfirmation, BookingError>;
}

pub struct LocalBookingBackend {
    providers: ProviderService,
    booking: BookingService,
    checkout: CheckoutService,
}

impl LocalBookingBackend {
    pub fn new(state: &AppState) -> Self {
        Self {
            providers: ProviderService::new(state),
            booking: BookingService::new(state),
            checkout: CheckoutService::new(state),
        }
    }
}

#[async_trait]
impl BookingBackend for LocalBookingBackend {
    async fn fetch_provider(&self, _session: &Session, provider_id: Uuid) -> Result<Provider, BookingError> {
        Ok(self.providers.get_provider(provider_id).await?)
    }

    async fn book(&self, session: &Session, request: BookAppointmentRequest) -> Result<Appointment, BookingError> {
        let user = session.user()?;
        self.booking.book(&user.id, request).await
    }

    async fn create_payment_session(
        &self,
        session: &Session,
        appointment_ids: &[Uuid],
    ) -> Result<CheckoutSession, BookingError> {
        let user = session.user()?;
        Ok(self.checkout.create_session(user, appointment_ids).await?)
    }

    async fn verify_payment(&self, session: &Session, session_id: &str) -> Result<PaymentConfirmation, BookingError> {
        let user = session.user()?;
        Ok(self.checkout.verify(session_id, Some(&user.id)).await?)
    }
}
