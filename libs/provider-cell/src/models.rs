// libs/provider-cell/src/models.rs
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

// ==============================================================================
// SLOT GRID
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Display form, `hh:mm AM`.
    pub time: String,
    pub datetime: NaiveDateTime,
    pub is_booked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    /// Key used in booked slot maps, `D/M/YYYY`.
    pub slot_date: String,
    pub slots: Vec<TimeSlot>,
}

impl DaySlots {
    pub fn free_slots(&self) -> impl Iterator<Item = &TimeSlot> {
        self.slots.iter().filter(|s| !s.is_booked)
    }

    pub fn slot(&self, time: &str) -> Option<&TimeSlot> {
        self.slots.iter().find(|s| s.time == time)
    }
}

#[derive(Debug, Deserialize)]
pub struct SlotGridQuery {
    /// Comma separated provider ids; the first one is the primary.
    pub ids: String,
    pub months: Option<u32>,
    pub start_hour: Option<u32>,
}

// ==============================================================================
// SELECTION
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionNotice {
    Added,
    AlreadySelected,
    Unavailable,
}

impl SelectionNotice {
    pub fn message(&self) -> &'static str {
        match self {
            SelectionNotice::Added => "Provider added to this booking",
            SelectionNotice::AlreadySelected => "This provider is already selected",
            SelectionNotice::Unavailable => "This provider is not taking bookings right now",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("The primary provider cannot be removed from the booking")]
    PrimaryNotRemovable,

    #[error("Provider {0} is not part of this booking")]
    NotSelected(Uuid),
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider {0} not found")]
    NotFound(Uuid),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(_) => AppError::NotFound(err.to_string()),
            ProviderError::InvalidQuery(msg) => AppError::BadRequest(msg),
            ProviderError::Store(e) => e.into(),
        }
    }
}
