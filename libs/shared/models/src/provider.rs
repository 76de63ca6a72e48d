use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved slot times keyed by slot date (`D/M/YYYY`).
///
/// Only the store's reserve/release operations mutate a persisted provider's
/// slots; everything else treats this as read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookedSlots(BTreeMap<String, BTreeSet<String>>);

impl BookedSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_booked(&self, slot_date: &str, slot_time: &str) -> bool {
        self.0
            .get(slot_date)
            .map(|times| times.contains(slot_time))
            .unwrap_or(false)
    }

    pub fn times_on(&self, slot_date: &str) -> Option<&BTreeSet<String>> {
        self.0.get(slot_date)
    }

    /// Adds the time if absent. Returns `false` when it was already taken.
    pub fn insert(&mut self, slot_date: &str, slot_time: &str) -> bool {
        self.0
            .entry(slot_date.to_string())
            .or_default()
            .insert(slot_time.to_string())
    }

    /// Removes the time, dropping the date entry once it has no times left.
    pub fn remove(&mut self, slot_date: &str, slot_time: &str) -> bool {
        let Some(times) = self.0.get_mut(slot_date) else {
            return false;
        };
        let removed = times.remove(slot_time);
        if times.is_empty() {
            self.0.remove(slot_date);
        }
        removed
    }

    pub fn dates(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub speciality: String,
    #[serde(default)]
    pub about: String,
    pub fee: f64,
    pub available: bool,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub booked_slots: BookedSlots,
    pub created_at: DateTime<Utc>,
}

impl Provider {
    pub fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            id: self.id,
            name: self.name.clone(),
            speciality: self.speciality.clone(),
            fee: self.fee,
            image: self.image.clone(),
            address: self.address.clone(),
        }
    }
}

/// Provider data copied into an appointment at booking time. Booked slots
/// are deliberately left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub id: Uuid,
    pub name: String,
    pub speciality: String,
    pub fee: f64,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProvider {
    pub name: String,
    pub speciality: String,
    #[serde(default)]
    pub about: String,
    pub fee: f64,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub address: Option<String>,
}

impl NewProvider {
    pub fn into_provider(self) -> Provider {
        Provider {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            speciality: self.speciality.trim().to_string(),
            about: self.about,
            fee: self.fee,
            available: true,
            image: self.image,
            address: self.address,
            booked_slots: BookedSlots::new(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_add_if_absent() {
        let mut slots = BookedSlots::new();
        assert!(slots.insert("12/3/2025", "10:00 AM"));
        assert!(!slots.insert("12/3/2025", "10:00 AM"));
        assert!(slots.insert("12/3/2025", "10:30 AM"));
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn remove_drops_empty_dates() {
        let mut slots = BookedSlots::new();
        slots.insert("12/3/2025", "10:00 AM");

        assert!(slots.remove("12/3/2025", "10:00 AM"));
        assert!(slots.is_empty());
        assert!(!slots.remove("12/3/2025", "10:00 AM"));
    }

    #[test]
    fn booked_slots_serialize_as_plain_map() {
        let mut slots = BookedSlots::new();
        slots.insert("1/4/2025", "09:00 AM");

        let value = serde_json::to_value(&slots).unwrap();
        assert_eq!(value, serde_json::json!({ "1/4/2025": ["09:00 AM"] }));
    }
}
