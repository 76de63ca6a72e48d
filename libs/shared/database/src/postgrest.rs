use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::appointment::Appointment;
use shared_models::patient::Patient;
use shared_models::provider::Provider;

use crate::error::{StoreError, StoreResult};
use crate::normalize::{normalize_appointment_row, normalize_patient_row, normalize_provider_row};
use crate::store::{AppointmentFilter, AppointmentPatch, ClinicStore};
use crate::supabase::{return_representation, SupabaseClient};

/// [`ClinicStore`] backed by Supabase tables `providers`, `appointments` and
/// `patients`. Slot reservation goes through the `reserve_provider_slot` and
/// `release_provider_slot` functions in `sql/slot_reservation.sql`, each a
/// single conditional update.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>, normalize: fn(Value) -> Value) -> StoreResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(normalize(row)).map_err(StoreError::from))
        .collect()
}

fn first<T>(rows: Vec<T>, what: String) -> StoreResult<T> {
    rows.into_iter().next().ok_or(StoreError::NotFound(what))
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn fetch(&self, path: &str) -> StoreResult<Vec<Value>> {
        Ok(self.supabase.request(Method::GET, path, None, None).await?)
    }

    async fn write(&self, method: Method, path: &str, body: Value) -> StoreResult<Vec<Value>> {
        Ok(self
            .supabase
            .request_with_headers(method, path, None, Some(body), Some(return_representation()))
            .await?)
    }

    fn appointment_query(filter: &AppointmentFilter) -> String {
        let mut query = vec!["select=*".to_string()];
        if let Some(patient_id) = &filter.patient_id {
            query.push(format!("patient_id=eq.{}", urlencoding::encode(patient_id)));
        }
        if let Some(provider_id) = filter.provider_id {
            query.push(format!("provider_ids=cs.%7B{}%7D", provider_id));
        }
        if let Some(cancelled) = filter.cancelled {
            query.push(format!("cancelled=eq.{}", cancelled));
        }
        if let Some(paid) = filter.paid {
            query.push(format!("paid=eq.{}", paid));
        }
        if let Some(session) = &filter.payment_session_id {
            query.push(format!("payment_session_id=eq.{}", urlencoding::encode(session)));
        }
        if let Some(cutoff) = filter.created_before {
            query.push(format!("created_at=lt.{}", urlencoding::encode(&cutoff.to_rfc3339())));
        }
        query.push("order=created_at.desc".to_string());
        format!("/rest/v1/appointments?{}", query.join("&"))
    }
}

#[async_trait]
impl ClinicStore for SupabaseStore {
    async fn list_providers(&self) -> StoreResult<Vec<Provider>> {
        let rows = self.fetch("/rest/v1/providers?select=*&order=created_at.asc").await?;
        decode_rows(rows, normalize_provider_row)
    }

    async fn get_provider(&self, id: Uuid) -> StoreResult<Option<Provider>> {
        let rows = self.fetch(&format!("/rest/v1/providers?id=eq.{}", id)).await?;
        Ok(decode_rows(rows, normalize_provider_row)?.into_iter().next())
    }

    async fn find_provider_by_name(&self, name: &str) -> StoreResult<Option<Provider>> {
        let path = format!("/rest/v1/providers?name=ilike.{}", urlencoding::encode(name.trim()));
        let rows = self.fetch(&path).await?;
        Ok(decode_rows(rows, normalize_provider_row)?.into_iter().next())
    }

    async fn insert_provider(&self, provider: Provider) -> StoreResult<Provider> {
        debug!("Inserting provider {}", provider.name);
        let rows = self
            .write(Method::POST, "/rest/v1/providers", serde_json::to_value(&provider)?)
            .await?;
        first(decode_rows(rows, normalize_provider_row)?, format!("Provider {}", provider.id))
    }

    async fn set_provider_availability(&self, id: Uuid, available: bool) -> StoreResult<Provider> {
        let path = format!("/rest/v1/providers?id=eq.{}", id);
        let rows = self.write(Method::PATCH, &path, json!({ "available": available })).await?;
        first(decode_rows(rows, normalize_provider_row)?, format!("Provider {}", id))
    }

    async fn delete_provider(&self, id: Uuid) -> StoreResult<()> {
        let path = format!("/rest/v1/providers?id=eq.{}", id);
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, None, None, Some(return_representation()))
            .await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("Provider {}", id)));
        }
        Ok(())
    }

    async fn reserve_slot(&self, provider_id: Uuid, slot_date: &str, slot_time: &str) -> StoreResult<bool> {
        let reserved: bool = self
            .supabase
            .rpc(
                "reserve_provider_slot",
                json!({
                    "p_provider_id": provider_id,
                    "p_slot_date": slot_date,
                    "p_slot_time": slot_time
                }),
            )
            .await?;
        if !reserved {
            warn!("Slot {} {} already held for provider {}", slot_date, slot_time, provider_id);
        }
        Ok(reserved)
    }

    async fn release_slot(&self, provider_id: Uuid, slot_date: &str, slot_time: &str) -> StoreResult<bool> {
        Ok(self
            .supabase
            .rpc(
                "release_provider_slot",
                json!({
                    "p_provider_id": provider_id,
                    "p_slot_date": slot_date,
                    "p_slot_time": slot_time
                }),
            )
            .await?)
    }

    async fn insert_appointment(&self, appointment: Appointment) -> StoreResult<Appointment> {
        let rows = self
            .write(Method::POST, "/rest/v1/appointments", serde_json::to_value(&appointment)?)
            .await?;
        first(decode_rows(rows, normalize_appointment_row)?, format!("Appointment {}", appointment.id))
    }

    async fn get_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        let rows = self.fetch(&format!("/rest/v1/appointments?id=eq.{}", id)).await?;
        Ok(decode_rows(rows, normalize_appointment_row)?.into_iter().next())
    }

    async fn list_appointments(&self, filter: AppointmentFilter) -> StoreResult<Vec<Appointment>> {
        let rows = self.fetch(&Self::appointment_query(&filter)).await?;
        decode_rows(rows, normalize_appointment_row)
    }

    async fn update_appointment(&self, id: Uuid, patch: AppointmentPatch) -> StoreResult<Appointment> {
        if patch.is_empty() {
            return self
                .get_appointment(id)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", id)));
        }
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self.write(Method::PATCH, &path, serde_json::to_value(&patch)?).await?;
        first(decode_rows(rows, normalize_appointment_row)?, format!("Appointment {}", id))
    }

    async fn cancel_if_active(
        &self,
        id: Uuid,
        cancelled_at: DateTime<Utc>,
        unpaid_only: bool,
    ) -> StoreResult<Option<Appointment>> {
        let mut path = format!(
            "/rest/v1/appointments?id=eq.{}&cancelled=eq.false&completed=eq.false",
            id
        );
        if unpaid_only {
            path.push_str("&paid=eq.false");
        }
        let body = json!({ "cancelled": true, "cancelled_at": cancelled_at });
        let rows = self.write(Method::PATCH, &path, body).await?;
        let updated = decode_rows(rows, normalize_appointment_row)?.into_iter().next();
        if updated.is_none() {
            debug!("Appointment {} no longer cancellable", id);
        }
        Ok(updated)
    }

    async fn get_patient(&self, id: &str) -> StoreResult<Option<Patient>> {
        let path = format!("/rest/v1/patients?id=eq.{}", urlencoding::encode(id));
        let rows = self.fetch(&path).await?;
        Ok(decode_rows(rows, normalize_patient_row)?.into_iter().next())
    }

    async fn upsert_patient(&self, patient: Patient) -> StoreResult<Patient> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/patients",
                None,
                Some(serde_json::to_value(&patient)?),
                Some(headers),
            )
            .await?;
        first(decode_rows(rows, normalize_patient_row)?, format!("Patient {}", patient.id))
    }

    async fn count_patients(&self) -> StoreResult<usize> {
        let rows = self.fetch("/rest/v1/patients?select=id").await?;
        Ok(rows.len())
    }
}
