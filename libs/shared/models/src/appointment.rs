use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::intake::IntakeForm;
use crate::patient::PatientSnapshot;
use crate::provider::ProviderSnapshot;

/// One booking of a slot with one or more providers. The first provider id is
/// the primary provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: String,
    pub provider_ids: Vec<Uuid>,
    pub slot_date: String,
    pub slot_time: String,
    pub amount: f64,
    #[serde(default)]
    pub patient_snapshot: Option<PatientSnapshot>,
    #[serde(default)]
    pub provider_snapshots: Vec<ProviderSnapshot>,
    #[serde(default)]
    pub intake_form: IntakeForm,
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub paid: bool,

    // Payment correlation
    #[serde(default)]
    pub payment_session_id: Option<String>,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub paid_amount: Option<f64>,
    #[serde(default)]
    pub paid_currency: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refund_id: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    AwaitingPayment,
    Paid,
    Completed,
    Cancelled,
}

/// Rejected lifecycle transitions. Cancellation is final.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Appointment {0} is cancelled")]
    Cancelled(Uuid),

    #[error("Appointment {0} is already completed")]
    Completed(Uuid),
}

impl Appointment {
    /// Payment may only land on a live appointment. Already paid is fine,
    /// the caller treats it as a no-op.
    pub fn ensure_can_pay(&self) -> Result<(), LifecycleError> {
        if self.cancelled {
            return Err(LifecycleError::Cancelled(self.id));
        }
        Ok(())
    }

    pub fn ensure_can_complete(&self) -> Result<(), LifecycleError> {
        if self.cancelled {
            return Err(LifecycleError::Cancelled(self.id));
        }
        Ok(())
    }

    pub fn ensure_can_cancel(&self) -> Result<(), LifecycleError> {
        if self.cancelled {
            return Err(LifecycleError::Cancelled(self.id));
        }
        if self.completed {
            return Err(LifecycleError::Completed(self.id));
        }
        Ok(())
    }

    pub fn primary_provider_id(&self) -> Option<Uuid> {
        self.provider_ids.first().copied()
    }

    pub fn references_provider(&self, provider_id: Uuid) -> bool {
        self.provider_ids.contains(&provider_id)
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled
    }

    pub fn status(&self) -> AppointmentStatus {
        if self.cancelled {
            AppointmentStatus::Cancelled
        } else if self.completed {
            AppointmentStatus::Completed
        } else if self.paid {
            AppointmentStatus::Paid
        } else {
            AppointmentStatus::AwaitingPayment
        }
    }

    pub fn primary_provider_name(&self) -> Option<&str> {
        self.provider_snapshots.first().map(|p| p.name.as_str())
    }
}
