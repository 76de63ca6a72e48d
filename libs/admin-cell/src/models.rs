// libs/admin-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use appointment_cell::BookingError;
use shared_database::StoreError;
use shared_models::appointment::Appointment;
use shared_models::error::AppError;

// ==============================================================================
// DASHBOARD
// ==============================================================================

pub const LATEST_APPOINTMENTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub providers: usize,
    pub appointments: usize,
    pub patients: usize,
    /// Percentages over every appointment ever booked, 0 when there are none.
    pub completion_rate: f64,
    pub cancellation_rate: f64,
    pub payment_rate: f64,
    /// Newest first.
    pub latest_appointments: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiredBookings {
    pub cancelled: Vec<Uuid>,
    pub total: usize,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("{0}")]
    InvalidProvider(String),

    #[error("A provider named {0} already exists")]
    DuplicateProvider(String),

    #[error("Provider {0} not found")]
    ProviderNotFound(Uuid),

    #[error("Provider {provider_id} still has {count} active appointments")]
    ProviderInUse { provider_id: Uuid, count: usize },

    #[error(transparent)]
    Access(#[from] AppError),

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::InvalidProvider(msg) => AppError::ValidationError(msg),
            AdminError::DuplicateProvider(_) => AppError::Conflict(err.to_string()),
            AdminError::ProviderNotFound(_) => AppError::NotFound(err.to_string()),
            AdminError::ProviderInUse { count, .. } => AppError::Integrity {
                message: format!(
                    "Provider cannot be deleted while {} active appointments reference it",
                    count
                ),
                count,
            },
            AdminError::Access(e) => e,
            AdminError::Booking(e) => e.into(),
            AdminError::Store(e) => e.into(),
        }
    }
}
