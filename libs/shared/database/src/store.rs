use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use shared_models::appointment::Appointment;
use shared_models::patient::Patient;
use shared_models::provider::Provider;

use crate::error::StoreResult;

/// Persistence boundary for providers, appointments and patients.
///
/// `reserve_slot` and `release_slot` are the only operations allowed to touch
/// a provider's booked slots. `reserve_slot` is an atomic add-if-absent and
/// returns `false` when the time is already held.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn list_providers(&self) -> StoreResult<Vec<Provider>>;
    async fn get_provider(&self, id: Uuid) -> StoreResult<Option<Provider>>;
    async fn find_provider_by_name(&self, name: &str) -> StoreResult<Option<Provider>>;
    async fn insert_provider(&self, provider: Provider) -> StoreResult<Provider>;
    async fn set_provider_availability(&self, id: Uuid, available: bool) -> StoreResult<Provider>;
    async fn delete_provider(&self, id: Uuid) -> StoreResult<()>;

    async fn reserve_slot(&self, provider_id: Uuid, slot_date: &str, slot_time: &str) -> StoreResult<bool>;
    async fn release_slot(&self, provider_id: Uuid, slot_date: &str, slot_time: &str) -> StoreResult<bool>;

    async fn insert_appointment(&self, appointment: Appointment) -> StoreResult<Appointment>;
    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>>;
    /// Matching appointments, newest first.
    async fn list_appointments(&self, filter: AppointmentFilter) -> StoreResult<Vec<Appointment>>;
    async fn update_appointment(&self, id: Uuid, patch: AppointmentPatch) -> StoreResult<Appointment>;
    /// Marks the appointment cancelled only while it is neither cancelled nor
    /// completed, and with `unpaid_only` also not paid. Returns the updated
    /// row, or `None` when the stored row no longer qualifies.
    async fn cancel_if_active(
        &self,
        id: Uuid,
        cancelled_at: DateTime<Utc>,
        unpaid_only: bool,
    ) -> StoreResult<Option<Appointment>>;

    async fn get_patient(&self, id: &str) -> StoreResult<Option<Patient>>;
    async fn upsert_patient(&self, patient: Patient) -> StoreResult<Patient>;
    async fn count_patients(&self) -> StoreResult<usize>;
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub patient_id: Option<String>,
    pub provider_id: Option<Uuid>,
    pub cancelled: Option<bool>,
    pub paid: Option<bool>,
    pub payment_session_id: Option<String>,
    pub created_before: Option<DateTime<Utc>>,
}

impl AppointmentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_patient(patient_id: &str) -> Self {
        Self {
            patient_id: Some(patient_id.to_string()),
            ..Self::default()
        }
    }

    /// Non-cancelled appointments naming the provider anywhere in their list.
    pub fn active_for_provider(provider_id: Uuid) -> Self {
        Self {
            provider_id: Some(provider_id),
            cancelled: Some(false),
            ..Self::default()
        }
    }

    pub fn for_payment_session(session_id: &str) -> Self {
        Self {
            payment_session_id: Some(session_id.to_string()),
            ..Self::default()
        }
    }

    /// Unpaid, non-cancelled appointments created before the cutoff.
    pub fn unpaid_before(cutoff: DateTime<Utc>) -> Self {
        Self {
            cancelled: Some(false),
            paid: Some(false),
            created_before: Some(cutoff),
            ..Self::default()
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.patient_id.as_deref().map_or(true, |id| appointment.patient_id == id)
            && self.provider_id.map_or(true, |id| appointment.references_provider(id))
            && self.cancelled.map_or(true, |c| appointment.cancelled == c)
            && self.paid.map_or(true, |p| appointment.paid == p)
            && self
                .payment_session_id
                .as_deref()
                .map_or(true, |s| appointment.payment_session_id.as_deref() == Some(s))
            && self.created_before.map_or(true, |cutoff| appointment.created_at < cutoff)
    }
}

/// Partial update of an appointment. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
}

impl AppointmentPatch {
    pub fn apply(&self, appointment: &mut Appointment) {
        if let Some(cancelled) = self.cancelled {
            appointment.cancelled = cancelled;
        }
        if let Some(at) = self.cancelled_at {
            appointment.cancelled_at = Some(at);
        }
        if let Some(completed) = self.completed {
            appointment.completed = completed;
        }
        if let Some(paid) = self.paid {
            appointment.paid = paid;
        }
        if let Some(at) = self.paid_at {
            appointment.paid_at = Some(at);
        }
        if let Some(amount) = self.paid_amount {
            appointment.paid_amount = Some(amount);
        }
        if let Some(currency) = &self.paid_currency {
            appointment.paid_currency = Some(currency.clone());
        }
        if let Some(session) = &self.payment_session_id {
            appointment.payment_session_id = Some(session.clone());
        }
        if let Some(intent) = &self.payment_intent_id {
            appointment.payment_intent_id = Some(intent.clone());
        }
        if let Some(refund) = &self.refund_id {
            appointment.refund_id = Some(refund.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        serde_json::to_value(self)
            .map(|v| v.as_object().map_or(true, |o| o.is_empty()))
            .unwrap_or(true)
    }
}
