// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use provider_cell::services::slots::{format_slot_date, format_slot_time, is_on_grid, parse_slot_date, parse_slot_time};
use shared_config::AppConfig;
use shared_database::{AppointmentFilter, ClinicStore};
use shared_models::appointment::Appointment;
use shared_models::auth::User;
use shared_models::provider::Provider;
use shared_utils::AppState;

use crate::models::{BookAppointmentRequest, BookingError};
use crate::services::lifecycle::AppointmentLifecycle;

pub struct BookingService {
    config: Arc<AppConfig>,
    store: Arc<dyn ClinicStore>,
    lifecycle: AppointmentLifecycle,
}

/// Slot key in stored form after parsing and re-formatting the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotKey {
    pub slot_date: String,
    pub slot_time: String,
}

impl SlotKey {
    pub fn parse(slot_date: &str, slot_time: &str) -> Result<Self, BookingError> {
        let date = parse_slot_date(slot_date)
            .ok_or_else(|| BookingError::Validation(format!("Invalid slot date: {}", slot_date)))?;
        let time = parse_slot_time(slot_time)
            .ok_or_else(|| BookingError::Validation(format!("Invalid slot time: {}", slot_time)))?;
        if !is_on_grid(time) {
            return Err(BookingError::Validation(format!(
                "{} is not a bookable slot time",
                slot_time
            )));
        }

        Ok(Self {
            slot_date: format_slot_date(date),
            slot_time: format_slot_time(time),
        })
    }
}

impl BookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            config: state.config.clone(),
            store: state.store.clone(),
            lifecycle: AppointmentLifecycle::new(state),
        }
    }

    async fn bookable_provider(&self, provider_id: Uuid) -> Result<Provider, BookingError> {
        let provider = self
            .store
            .get_provider(provider_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Provider {} not found", provider_id)))?;

        if !provider.available {
            return Err(BookingError::Validation(format!(
                "{} is not taking bookings right now",
                provider.name
            )));
        }
        Ok(provider)
    }

    async fn release_all(&self, providers: &[&Provider], slot: &SlotKey) {
        for provider in providers {
            if let Err(e) = self
                .store
                .release_slot(provider.id, &slot.slot_date, &slot.slot_time)
                .await
            {
                error!("Failed to roll back slot for provider {}: {}", provider.id, e);
            }
        }
    }

    /// Reserves every provider in order. On the first conflict the providers
    /// already reserved are released again.
    async fn reserve_all(&self, providers: &[Provider], slot: &SlotKey) -> Result<(), BookingError> {
        let mut reserved: Vec<&Provider> = Vec::with_capacity(providers.len());

        for provider in providers {
            let outcome = self
                .store
                .reserve_slot(provider.id, &slot.slot_date, &slot.slot_time)
                .await;

            match outcome {
                Ok(true) => reserved.push(provider),
                Ok(false) => {
                    warn!(
                        "Slot {} {} already taken for provider {}",
                        slot.slot_date, slot.slot_time, provider.id
                    );
                    self.release_all(&reserved, slot).await;
                    return Err(BookingError::Conflict(format!(
                        "{} is no longer available on {} at {}",
                        provider.name, slot.slot_date, slot.slot_time
                    )));
                }
                Err(e) => {
                    self.release_all(&reserved, slot).await;
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    pub async fn book(
        &self,
        patient_id: &str,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, BookingError> {
        debug!(
            "Booking {} providers on {} at {} for patient {}",
            request.provider_ids.len(),
            request.slot_date,
            request.slot_time,
            patient_id
        );

        let mut provider_ids: Vec<Uuid> = Vec::with_capacity(request.provider_ids.len());
        for id in &request.provider_ids {
            if !provider_ids.contains(id) {
                provider_ids.push(*id);
            }
        }
        if provider_ids.is_empty() {
            return Err(BookingError::Validation("Select at least one provider".to_string()));
        }

        let slot = SlotKey::parse(&request.slot_date, &request.slot_time)?;
        request.intake_form.validate_for_submission()?;

        let mut providers = Vec::with_capacity(provider_ids.len());
        for id in &provider_ids {
            providers.push(self.bookable_provider(*id).await?);
        }

        self.reserve_all(&providers, &slot).await?;

        let patient_snapshot = match self.store.get_patient(patient_id).await {
            Ok(Some(patient)) => Some(patient.snapshot()),
            Ok(None) => {
                warn!("Patient {} has no profile, booking without snapshot", patient_id);
                None
            }
            Err(e) => {
                let refs: Vec<&Provider> = providers.iter().collect();
                self.release_all(&refs, &slot).await;
                return Err(e.into());
            }
        };

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            provider_ids,
            slot_date: slot.slot_date.clone(),
            slot_time: slot.slot_time.clone(),
            amount: providers.iter().map(|p| p.fee).sum(),
            patient_snapshot,
            provider_snapshots: providers.iter().map(Provider::snapshot).collect(),
            intake_form: request.intake_form,
            message: request.message.filter(|m| !m.trim().is_empty()),
            cancelled: false,
            completed: false,
            paid: false,
            payment_session_id: None,
            payment_intent_id: None,
            paid_amount: None,
            paid_currency: None,
            paid_at: None,
            refund_id: None,
            created_at: Utc::now(),
            cancelled_at: None,
        };

        match self.store.insert_appointment(appointment).await {
            Ok(created) => {
                info!(
                    "Appointment {} booked for patient {} ({} on {} at {})",
                    created.id,
                    patient_id,
                    created.primary_provider_name().unwrap_or_default(),
                    created.slot_date,
                    created.slot_time
                );
                Ok(created)
            }
            Err(e) => {
                let refs: Vec<&Provider> = providers.iter().collect();
                self.release_all(&refs, &slot).await;
                Err(e.into())
            }
        }
    }

    /// The owner or an admin may read an appointment.
    pub async fn get_for_user(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let appointment = self.lifecycle.load(appointment_id).await?;
        if appointment.patient_id != user.id && !user.is_admin() {
            return Err(BookingError::Forbidden("You can only view your own appointments".to_string()));
        }
        Ok(appointment)
    }

    pub async fn list_for_patient(&self, patient_id: &str) -> Result<Vec<Appointment>, BookingError> {
        Ok(self
            .store
            .list_appointments(AppointmentFilter::for_patient(patient_id))
            .await?)
    }

    pub async fn cancel(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let appointment = self.lifecycle.load(appointment_id).await?;
        if appointment.patient_id != user.id && !user.is_admin() {
            warn!("User {} tried to cancel appointment {}", user.id, appointment_id);
            return Err(BookingError::Forbidden("You can only cancel your own appointments".to_string()));
        }
        self.lifecycle.cancel(appointment).await
    }

    /// Cancels unpaid appointments older than the configured TTL and frees
    /// their slots. Returns the ids that were expired.
    pub async fn expire_unpaid(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, BookingError> {
        let cutoff = now - Duration::minutes(self.config.unpaid_appointment_ttl_minutes);
        let stale = self
            .store
            .list_appointments(AppointmentFilter::unpaid_before(cutoff))
            .await?;

        let mut expired = Vec::with_capacity(stale.len());
        for appointment in stale {
            match self.lifecycle.expire(&appointment).await {
                Ok(Some(cancelled)) => expired.push(cancelled.id),
                Ok(None) => {}
                Err(e) => error!("Failed to expire unpaid appointment {}: {}", appointment.id, e),
            }
        }

        if !expired.is_empty() {
            info!("Expired {} unpaid appointments created before {}", expired.len(), cutoff);
        }
        Ok(expired)
    }
}
