// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_database::{AppointmentPatch, ClinicStore};
use shared_models::appointment::Appointment;
use shared_payments::{to_cents, PaymentGateway};
use shared_utils::AppState;

use crate::models::BookingError;

/// Cancellation and completion rules shared by patients, admins and the
/// unpaid sweep. Cancelling frees the slot for every provider on the
/// appointment and refunds a captured payment.
pub struct AppointmentLifecycle {
    store: Arc<dyn ClinicStore>,
    payments: Arc<dyn PaymentGateway>,
}

impl AppointmentLifecycle {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            payments: state.payments.clone(),
        }
    }

    pub async fn load(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Appointment {} not found", appointment_id)))
    }

    /// Cancels the stored appointment. The caller's copy may be stale; the
    /// store only flips a row that is still live, so slots are released and
    /// payments refunded at most once.
    pub async fn cancel(&self, appointment: Appointment) -> Result<Appointment, BookingError> {
        debug!("Cancelling appointment {}", appointment.id);
        appointment.ensure_can_cancel()?;

        match self.store.cancel_if_active(appointment.id, Utc::now(), false).await? {
            Some(cancelled) => self.settle_cancellation(cancelled).await,
            None => {
                let current = self.load(appointment.id).await?;
                current.ensure_can_cancel()?;
                Err(BookingError::Conflict(format!(
                    "Appointment {} changed while cancelling, try again",
                    appointment.id
                )))
            }
        }
    }

    /// Cancels an appointment only if it is still unpaid. Returns `None` when
    /// it was paid, cancelled or completed since it was listed.
    pub async fn expire(&self, appointment: &Appointment) -> Result<Option<Appointment>, BookingError> {
        match self.store.cancel_if_active(appointment.id, Utc::now(), true).await? {
            Some(cancelled) => Ok(Some(self.settle_cancellation(cancelled).await?)),
            None => {
                debug!("Appointment {} settled before expiry, skipped", appointment.id);
                Ok(None)
            }
        }
    }

    async fn settle_cancellation(&self, mut cancelled: Appointment) -> Result<Appointment, BookingError> {
        for provider_id in &cancelled.provider_ids {
            match self
                .store
                .release_slot(*provider_id, &cancelled.slot_date, &cancelled.slot_time)
                .await
            {
                Ok(true) => {}
                Ok(false) => warn!(
                    "Slot {} {} was not held by provider {}",
                    cancelled.slot_date, cancelled.slot_time, provider_id
                ),
                Err(e) => error!("Failed to release slot for provider {}: {}", provider_id, e),
            }
        }

        if cancelled.paid {
            if let Some(refund_id) = self.refund(&cancelled).await {
                cancelled = self
                    .store
                    .update_appointment(
                        cancelled.id,
                        AppointmentPatch {
                            refund_id: Some(refund_id),
                            ..AppointmentPatch::default()
                        },
                    )
                    .await?;
            }
        }

        info!("Appointment {} cancelled", cancelled.id);
        Ok(cancelled)
    }

    /// Refund failures do not block cancellation; they are logged for follow-up.
    async fn refund(&self, appointment: &Appointment) -> Option<String> {
        let Some(intent) = appointment.payment_intent_id.as_deref() else {
            error!("Paid appointment {} has no payment intent to refund", appointment.id);
            return None;
        };
        let amount = to_cents(appointment.paid_amount.unwrap_or(appointment.amount));

        match self.payments.refund(intent, Some(amount)).await {
            Ok(receipt) => {
                info!("Refund {} issued for appointment {}", receipt.id, appointment.id);
                Some(receipt.id)
            }
            Err(e) => {
                error!("Refund for appointment {} failed: {}", appointment.id, e);
                None
            }
        }
    }

    /// Completing twice is a no-op.
    pub async fn complete(&self, appointment: Appointment) -> Result<Appointment, BookingError> {
        appointment.ensure_can_complete()?;
        if appointment.completed {
            return Ok(appointment);
        }

        let completed = self
            .store
            .update_appointment(
                appointment.id,
                AppointmentPatch {
                    completed: Some(true),
                    ..AppointmentPatch::default()
                },
            )
            .await?;

        info!("Appointment {} completed", appointment.id);
        Ok(completed)
    }
}
