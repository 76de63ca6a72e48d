// libs/payment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::appointment::{AppointmentStatus, LifecycleError};
use shared_models::error::AppError;
use shared_payments::PaymentError;

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    pub appointment_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub session_id: String,
}

// ==============================================================================
// RESULTS
// ==============================================================================

/// Hosted checkout opened for one or more appointments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
    pub amount: f64,
    pub currency: String,
    pub appointment_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub session_id: String,
    pub paid: bool,
    pub appointment_ids: Vec<Uuid>,
    /// Appointments flipped to paid by this call. Zero on a repeat verification.
    pub newly_paid: usize,
    /// Payments captured for appointments cancelled in the meantime and
    /// refunded straight away.
    #[serde(default)]
    pub refunded: usize,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
    pub paid: bool,
    pub amount: f64,
    pub paid_amount: Option<f64>,
    pub paid_currency: Option<String>,
    pub payment_session_id: Option<String>,
}

/// Metadata keys written on every checkout session.
pub mod metadata_keys {
    pub const APPOINTMENT_IDS: &str = "appointment_ids";
    pub const USER_ID: &str = "user_id";
    pub const PROVIDER_NAME: &str = "provider_name";
    pub const DATE: &str = "date";
    pub const TIME: &str = "time";
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("No appointments given for checkout")]
    NothingToPay,

    #[error("Appointment {0} not found")]
    AppointmentNotFound(Uuid),

    #[error("Appointment {0} belongs to another patient")]
    NotOwner(Uuid),

    #[error("Payment session {0} belongs to another patient")]
    SessionOwner(String),

    #[error("Appointment {0} is already paid")]
    AlreadyPaid(Uuid),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::NothingToPay => AppError::ValidationError(err.to_string()),
            CheckoutError::AppointmentNotFound(_) => AppError::NotFound(err.to_string()),
            CheckoutError::NotOwner(_) | CheckoutError::SessionOwner(_) => {
                AppError::Forbidden(err.to_string())
            }
            CheckoutError::AlreadyPaid(_) => AppError::Conflict(err.to_string()),
            CheckoutError::Lifecycle(e) => e.into(),
            CheckoutError::Payment(PaymentError::InvalidSignature(msg)) => AppError::Auth(msg),
            CheckoutError::Payment(PaymentError::SessionNotFound(id)) => {
                AppError::NotFound(format!("Payment session {} not found", id))
            }
            CheckoutError::Payment(PaymentError::Rejected(msg)) => AppError::Payment(msg),
            CheckoutError::Payment(PaymentError::Transport(msg)) => AppError::ExternalService(msg),
            CheckoutError::Store(e) => e.into(),
        }
    }
}
