// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use payment_cell::models::CheckoutError;
use provider_cell::models::ProviderError;
use shared_database::StoreError;
use shared_models::appointment::{Appointment, LifecycleError};
use shared_models::error::AppError;
use shared_models::intake::{IntakeError, IntakeForm, ValidationError};

// ==============================================================================
// REQUESTS
// ==============================================================================

/// One booking of a slot. Several provider ids make a grouped booking: every
/// provider is reserved or none is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub provider_ids: Vec<Uuid>,
    pub slot_date: String,
    pub slot_time: String,
    #[serde(default)]
    pub intake_form: IntakeForm,
    #[serde(default)]
    pub message: Option<String>,
}

// ==============================================================================
// ORCHESTRATION RESULTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedBooking {
    pub provider_id: Uuid,
    pub provider_name: String,
    pub reason: String,
}

/// Result of booking the same slot with several providers one by one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingOutcome {
    pub succeeded: Vec<Appointment>,
    pub failed: Vec<FailedBooking>,
}

impl BookingOutcome {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.succeeded.is_empty()
    }

    pub fn total_amount(&self) -> f64 {
        self.succeeded.iter().map(|a| a.amount).sum()
    }

    pub fn appointment_ids(&self) -> Vec<Uuid> {
        self.succeeded.iter().map(|a| a.id).collect()
    }

    pub fn summary(&self) -> String {
        format!("{} of {} appointments booked", self.succeeded.len(), self.attempted())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub url: String,
    pub amount: f64,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingState {
    SelectingProviders,
    SelectingSlot,
    FillingIntakeForm,
    Confirming,
    CreatingAppointments,
    CreatingPaymentSession,
    AwaitingPaymentRedirect,
    VerifyingPayment,
    Booked,
    Failed,
    Cancelled,
}

impl BookingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingState::Booked | BookingState::Failed | BookingState::Cancelled)
    }
}

/// Where a failed booking flow stopped and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingFailure {
    pub step: BookingState,
    pub reason: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    IncompleteIntake(#[from] ValidationError),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Auth(String),

    #[error("Payment failed: {0}")]
    Payment(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Booking service error: {0}")]
    Backend(String),
}

impl BookingError {
    /// Errors the caller fixes by changing their input and trying again.
    /// Everything else ends the booking flow.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BookingError::Validation(_)
                | BookingError::IncompleteIntake(_)
                | BookingError::Conflict(_)
                | BookingError::NotFound(_)
        )
    }
}

impl From<IntakeError> for BookingError {
    fn from(err: IntakeError) -> Self {
        BookingError::Validation(err.to_string())
    }
}

impl From<ProviderError> for BookingError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(_) => BookingError::NotFound(err.to_string()),
            ProviderError::InvalidQuery(msg) => BookingError::Validation(msg),
            ProviderError::Store(e) => BookingError::Store(e),
        }
    }
}

impl From<CheckoutError> for BookingError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::NothingToPay => BookingError::Validation(err.to_string()),
            CheckoutError::AppointmentNotFound(_) => BookingError::NotFound(err.to_string()),
            CheckoutError::NotOwner(_) | CheckoutError::SessionOwner(_) => {
                BookingError::Forbidden(err.to_string())
            }
            CheckoutError::AlreadyPaid(_) => BookingError::Conflict(err.to_string()),
            CheckoutError::Lifecycle(e) => BookingError::Lifecycle(e),
            CheckoutError::Payment(e) => BookingError::Payment(e.to_string()),
            CheckoutError::Store(e) => BookingError::Store(e),
        }
    }
}

impl From<AppError> for BookingError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Auth(msg) => BookingError::Auth(msg),
            AppError::Forbidden(msg) => BookingError::Forbidden(msg),
            AppError::NotFound(msg) => BookingError::NotFound(msg),
            AppError::BadRequest(msg) | AppError::ValidationError(msg) => BookingError::Validation(msg),
            AppError::Conflict(msg) => BookingError::Conflict(msg),
            AppError::Payment(msg) => BookingError::Payment(msg),
            other => BookingError::Backend(other.to_string()),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(msg) => AppError::ValidationError(msg),
            BookingError::IncompleteIntake(e) => e.into(),
            BookingError::Conflict(msg) => AppError::Conflict(msg),
            BookingError::NotFound(msg) => AppError::NotFound(msg),
            BookingError::Forbidden(msg) => AppError::Forbidden(msg),
            BookingError::Auth(msg) => AppError::Auth(msg),
            BookingError::Payment(msg) => AppError::Payment(msg),
            BookingError::Lifecycle(e) => e.into(),
            BookingError::Store(e) => e.into(),
            BookingError::Backend(msg) => AppError::ExternalService(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_attempts() {
        let outcome = BookingOutcome {
            succeeded: vec![],
            failed: vec![FailedBooking {
                provider_id: Uuid::new_v4(),
                provider_name: "Dr. C".to_string(),
                reason: "taken".to_string(),
            }],
        };
        assert_eq!(outcome.summary(), "0 of 1 appointments booked");
        assert!(!outcome.is_complete());
    }

    #[test]
    fn only_input_errors_are_recoverable() {
        assert!(BookingError::Conflict("taken".into()).is_recoverable());
        assert!(BookingError::IncompleteIntake(ValidationError { missing: vec!["surname".into()] }).is_recoverable());
        assert!(!BookingError::Auth("expired".into()).is_recoverable());
        assert!(!BookingError::Payment("declined".into()).is_recoverable());
    }
}
