use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::appointment::Appointment;
use shared_models::patient::Patient;
use shared_models::provider::Provider;

use crate::error::{StoreError, StoreResult};
use crate::store::{AppointmentFilter, AppointmentPatch, ClinicStore};

/// Process-local store used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemoryStore {
    providers: RwLock<HashMap<Uuid, Provider>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    patients: RwLock<HashMap<String, Patient>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClinicStore for InMemoryStore {
    async fn list_providers(&self) -> StoreResult<Vec<Provider>> {
        let providers = self.providers.read().await;
        let mut list: Vec<Provider> = providers.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(list)
    }

    async fn get_provider(&self, id: Uuid) -> StoreResult<Option<Provider>> {
        Ok(self.providers.read().await.get(&id).cloned())
    }

    async fn find_provider_by_name(&self, name: &str) -> StoreResult<Option<Provider>> {
        let providers = self.providers.read().await;
        Ok(providers
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .cloned())
    }

    async fn insert_provider(&self, provider: Provider) -> StoreResult<Provider> {
        self.providers.write().await.insert(provider.id, provider.clone());
        Ok(provider)
    }

    async fn set_provider_availability(&self, id: Uuid, available: bool) -> StoreResult<Provider> {
        let mut providers = self.providers.write().await;
        let provider = providers
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Provider {}", id)))?;
        provider.available = available;
        Ok(provider.clone())
    }

    async fn delete_provider(&self, id: Uuid) -> StoreResult<()> {
        self.providers
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Provider {}", id)))
    }

    async fn reserve_slot(&self, provider_id: Uuid, slot_date: &str, slot_time: &str) -> StoreResult<bool> {
        // Check and insert happen under the same write guard.
        let mut providers = self.providers.write().await;
        let provider = providers
            .get_mut(&provider_id)
            .ok_or_else(|| StoreError::NotFound(format!("Provider {}", provider_id)))?;
        let reserved = provider.booked_slots.insert(slot_date, slot_time);
        debug!("Reserve {} {} for {}: {}", slot_date, slot_time, provider_id, reserved);
        Ok(reserved)
    }

    async fn release_slot(&self, provider_id: Uuid, slot_date: &str, slot_time: &str) -> StoreResult<bool> {
        let mut providers = self.providers.write().await;
        match providers.get_mut(&provider_id) {
            Some(provider) => Ok(provider.booked_slots.remove(slot_date, slot_time)),
            // Deleted providers have nothing left to release.
            None => Ok(false),
        }
    }

    async fn insert_appointment(&self, appointment: Appointment) -> StoreResult<Appointment> {
        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn list_appointments(&self, filter: AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let mut list: Vec<Appointment> = appointments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn update_appointment(&self, id: Uuid, patch: AppointmentPatch) -> StoreResult<Appointment> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", id)))?;
        patch.apply(appointment);
        Ok(appointment.clone())
    }

    async fn cancel_if_active(
        &self,
        id: Uuid,
        cancelled_at: DateTime<Utc>,
        unpaid_only: bool,
    ) -> StoreResult<Option<Appointment>> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", id)))?;

        if appointment.cancelled || appointment.completed || (unpaid_only && appointment.paid) {
            debug!("Appointment {} no longer cancellable", id);
            return Ok(None);
        }
        appointment.cancelled = true;
        appointment.cancelled_at = Some(cancelled_at);
        Ok(Some(appointment.clone()))
    }

    async fn get_patient(&self, id: &str) -> StoreResult<Option<Patient>> {
        Ok(self.patients.read().await.get(id).cloned())
    }

    async fn upsert_patient(&self, mut patient: Patient) -> StoreResult<Patient> {
        let mut patients = self.patients.write().await;
        if let Some(existing) = patients.get(&patient.id) {
            patient.created_at = existing.created_at;
        }
        patient.updated_at = Utc::now();
        patients.insert(patient.id.clone(), patient.clone());
        Ok(patient)
    }

    async fn count_patients(&self) -> StoreResult<usize> {
        Ok(self.patients.read().await.len())
    }
}
