// libs/patient-cell/src/services/profile.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use shared_database::ClinicStore;
use shared_models::auth::User;
use shared_models::patient::Patient;
use shared_utils::AppState;

use crate::models::{ProfileError, UpdateProfileRequest};

pub struct ProfileService {
    store: Arc<dyn ClinicStore>,
}

impl ProfileService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn get_profile(&self, user: &User) -> Result<Option<Patient>, ProfileError> {
        debug!("Loading profile for user {}", user.id);
        Ok(self.store.get_patient(&user.id).await?)
    }

    /// Creates the profile on first save. The email falls back to the one on
    /// the token.
    pub async fn update_profile(
        &self,
        user: &User,
        request: UpdateProfileRequest,
    ) -> Result<Patient, ProfileError> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            warn!("Profile update for {} missing {:?}", user.id, missing);
            return Err(ProfileError::MissingFields(missing));
        }

        let existing = self.store.get_patient(&user.id).await?;
        let now = Utc::now();

        let patient = Patient {
            id: user.id.clone(),
            name: request.name.trim().to_string(),
            email: request
                .email
                .filter(|e| !e.trim().is_empty())
                .or_else(|| user.email.clone()),
            phone: request.phone.trim().to_string(),
            dob: request.dob.trim().to_string(),
            gender: request.gender.trim().to_string(),
            address: request.address.filter(|a| !a.trim().is_empty()),
            created_at: existing.as_ref().map_or(now, |p| p.created_at),
            updated_at: now,
        };

        let saved = self.store.upsert_patient(patient).await?;
        info!("Profile saved for user {}", user.id);
        Ok(saved)
    }
}
