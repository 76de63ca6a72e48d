// libs/patient-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub phone: String,
    pub dob: String,
    pub gender: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl UpdateProfileRequest {
    pub const REQUIRED_FIELDS: [&'static str; 4] = ["name", "phone", "dob", "gender"];

    /// Required fields left blank, in form order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let values = [&self.name, &self.phone, &self.dob, &self.gender];
        Self::REQUIRED_FIELDS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Missing required profile fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::MissingFields(_) => AppError::ValidationError(err.to_string()),
            ProfileError::Store(e) => e.into(),
        }
    }
}
