// libs/provider-cell/src/services/provider.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::ClinicStore;
use shared_models::provider::Provider;
use shared_utils::AppState;

use crate::models::{DaySlots, ProviderError};
use crate::services::slots::{generate_slots, SlotHorizon};

pub struct ProviderService {
    store: Arc<dyn ClinicStore>,
}

impl ProviderService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// All providers, including ones not currently taking bookings.
    pub async fn list_providers(&self) -> Result<Vec<Provider>, ProviderError> {
        let providers = self.store.list_providers().await?;
        debug!("Loaded {} providers", providers.len());
        Ok(providers)
    }

    pub async fn get_provider(&self, provider_id: Uuid) -> Result<Provider, ProviderError> {
        self.store
            .get_provider(provider_id)
            .await?
            .ok_or(ProviderError::NotFound(provider_id))
    }

    /// Loads every id in order. Fails on the first unknown id.
    pub async fn get_many(&self, provider_ids: &[Uuid]) -> Result<Vec<Provider>, ProviderError> {
        let mut providers = Vec::with_capacity(provider_ids.len());
        for id in provider_ids {
            providers.push(self.get_provider(*id).await?);
        }
        Ok(providers)
    }

    pub async fn slot_grid(
        &self,
        provider_ids: &[Uuid],
        horizon: SlotHorizon,
        today: NaiveDate,
    ) -> Result<Vec<DaySlots>, ProviderError> {
        let providers = self.get_many(provider_ids).await?;
        for provider in providers.iter().filter(|p| !p.available) {
            warn!("Slot grid requested for unavailable provider {}", provider.id);
        }

        debug!(
            "Generating {}-month slot grid from {} for {} providers",
            horizon.months,
            today,
            providers.len()
        );
        Ok(generate_slots(&providers, horizon, today))
    }
}

/// Parses the comma separated `ids` query value, dropping duplicates but
/// keeping the first occurrence's position.
pub fn parse_provider_ids(raw: &str) -> Result<Vec<Uuid>, ProviderError> {
    let mut ids: Vec<Uuid> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = Uuid::parse_str(part)
            .map_err(|_| ProviderError::InvalidQuery(format!("Invalid provider id: {}", part)))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    if ids.is_empty() {
        return Err(ProviderError::InvalidQuery("At least one provider id is required".to_string()));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn ids_keep_order_and_drop_duplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let raw = format!("{}, {},{}", a, b, a);
        assert_eq!(parse_provider_ids(&raw).unwrap(), vec![a, b]);
    }

    #[test]
    fn bad_ids_are_rejected() {
        assert_matches!(parse_provider_ids(""), Err(ProviderError::InvalidQuery(_)));
        assert_matches!(parse_provider_ids("not-a-uuid"), Err(ProviderError::InvalidQuery(_)));
    }
}
