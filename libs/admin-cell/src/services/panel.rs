// libs/admin-cell/src/services/panel.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::{AppointmentLifecycle, BookingService};
use shared_database::{AppointmentFilter, ClinicStore};
use shared_models::appointment::Appointment;
use shared_models::provider::{NewProvider, Provider};
use shared_utils::{AppState, Session};

use crate::models::{AdminError, DashboardStats, ExpiredBookings};
use crate::services::dashboard::summarize;

/// Provider and appointment management for administrators. Every
/// construction checks the caller's session for the admin role.
pub struct AdminPanel {
    admin_id: String,
    store: Arc<dyn ClinicStore>,
    lifecycle: AppointmentLifecycle,
    booking: BookingService,
}

impl std::fmt::Debug for AdminPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminPanel")
            .field("admin_id", &self.admin_id)
            .finish_non_exhaustive()
    }
}

impl AdminPanel {
    pub fn new(session: &Session, state: AppState) -> Result<Self, AdminError> {
        let admin = session.require_admin()?;

        Ok(Self {
            admin_id: admin.id.clone(),
            store: state.store.clone(),
            lifecycle: AppointmentLifecycle::new(&state),
            booking: BookingService::new(&state),
        })
    }

    // ==========================================================================
    // PROVIDERS
    // ==========================================================================

    pub async fn list_providers(&self) -> Result<Vec<Provider>, AdminError> {
        Ok(self.store.list_providers().await?)
    }

    pub async fn add_provider(&self, request: NewProvider) -> Result<Provider, AdminError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AdminError::InvalidProvider("Provider name is required".to_string()));
        }
        if request.speciality.trim().is_empty() {
            return Err(AdminError::InvalidProvider("Speciality is required".to_string()));
        }
        if !request.fee.is_finite() || request.fee <= 0.0 {
            return Err(AdminError::InvalidProvider("Fee must be greater than zero".to_string()));
        }

        if self.store.find_provider_by_name(name).await?.is_some() {
            return Err(AdminError::DuplicateProvider(name.to_string()));
        }

        let provider = self.store.insert_provider(request.into_provider()).await?;
        info!("Admin {} added provider {} ({})", self.admin_id, provider.name, provider.id);
        Ok(provider)
    }

    /// Flips whether the provider takes new bookings.
    pub async fn toggle_availability(&self, provider_id: Uuid) -> Result<Provider, AdminError> {
        let provider = self
            .store
            .get_provider(provider_id)
            .await?
            .ok_or(AdminError::ProviderNotFound(provider_id))?;

        let updated = self
            .store
            .set_provider_availability(provider_id, !provider.available)
            .await?;
        info!(
            "Admin {} set provider {} available={}",
            self.admin_id, provider_id, updated.available
        );
        Ok(updated)
    }

    /// Deletes a provider no live appointment refers to, as primary or as a
    /// secondary provider of a grouped booking.
    pub async fn delete_provider(&self, provider_id: Uuid) -> Result<(), AdminError> {
        if self.store.get_provider(provider_id).await?.is_none() {
            return Err(AdminError::ProviderNotFound(provider_id));
        }

        let active = self
            .store
            .list_appointments(AppointmentFilter::active_for_provider(provider_id))
            .await?;
        if !active.is_empty() {
            warn!(
                "Refusing to delete provider {}: {} active appointments",
                provider_id,
                active.len()
            );
            return Err(AdminError::ProviderInUse {
                provider_id,
                count: active.len(),
            });
        }

        self.store.delete_provider(provider_id).await?;
        info!("Admin {} deleted provider {}", self.admin_id, provider_id);
        Ok(())
    }

    // ==========================================================================
    // APPOINTMENTS
    // ==========================================================================

    pub async fn list_appointments(&self) -> Result<Vec<Appointment>, AdminError> {
        Ok(self.store.list_appointments(AppointmentFilter::all()).await?)
    }

    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AdminError> {
        let appointment = self.lifecycle.load(appointment_id).await?;
        let cancelled = self.lifecycle.cancel(appointment).await?;
        info!("Admin {} cancelled appointment {}", self.admin_id, appointment_id);
        Ok(cancelled)
    }

    pub async fn complete_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AdminError> {
        let appointment = self.lifecycle.load(appointment_id).await?;
        let completed = self.lifecycle.complete(appointment).await?;
        info!("Admin {} completed appointment {}", self.admin_id, appointment_id);
        Ok(completed)
    }

    pub async fn expire_unpaid(&self) -> Result<ExpiredBookings, AdminError> {
        let cancelled = self.booking.expire_unpaid(Utc::now()).await?;
        info!("Admin {} expired {} unpaid bookings", self.admin_id, cancelled.len());
        Ok(ExpiredBookings {
            total: cancelled.len(),
            cancelled,
        })
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, AdminError> {
        let providers = self.store.list_providers().await?.len();
        let patients = self.store.count_patients().await?;
        let appointments = self.store.list_appointments(AppointmentFilter::all()).await?;
        debug!(
            "Dashboard over {} providers, {} patients, {} appointments",
            providers,
            patients,
            appointments.len()
        );

        Ok(summarize(providers, patients, appointments))
    }
}
