// libs/provider-cell/src/services/selection.rs
use tracing::debug;
use uuid::Uuid;

use shared_models::provider::Provider;

use crate::models::{SelectionError, SelectionNotice};

/// Providers chosen for one booking session. The first member is the primary
/// provider and stays for the life of the selection.
#[derive(Debug, Clone)]
pub struct ProviderSelection {
    members: Vec<Provider>,
    total_fee: f64,
}

impl ProviderSelection {
    pub fn new(primary: Provider) -> Self {
        let total_fee = primary.fee;
        Self {
            members: vec![primary],
            total_fee,
        }
    }

    fn recompute_fee(&mut self) {
        self.total_fee = self.members.iter().map(|p| p.fee).sum();
    }

    pub fn add(&mut self, provider: Provider) -> SelectionNotice {
        if self.contains(provider.id) {
            return SelectionNotice::AlreadySelected;
        }
        if !provider.available {
            debug!("Provider {} is unavailable, not added", provider.id);
            return SelectionNotice::Unavailable;
        }

        self.members.push(provider);
        self.recompute_fee();
        SelectionNotice::Added
    }

    pub fn remove(&mut self, provider_id: Uuid) -> Result<Provider, SelectionError> {
        if self.primary().id == provider_id {
            return Err(SelectionError::PrimaryNotRemovable);
        }
        let index = self
            .members
            .iter()
            .position(|p| p.id == provider_id)
            .ok_or(SelectionError::NotSelected(provider_id))?;

        let removed = self.members.remove(index);
        self.recompute_fee();
        Ok(removed)
    }

    /// Swaps in fresher data for a member, e.g. after re-reading its booked
    /// slots. Returns `false` if the provider is not selected.
    pub fn refresh(&mut self, provider: Provider) -> bool {
        match self.members.iter_mut().find(|p| p.id == provider.id) {
            Some(member) => {
                *member = provider;
                self.recompute_fee();
                true
            }
            None => false,
        }
    }

    pub fn primary(&self) -> &Provider {
        &self.members[0]
    }

    pub fn members(&self) -> &[Provider] {
        &self.members
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.members.iter().map(|p| p.id).collect()
    }

    pub fn contains(&self, provider_id: Uuid) -> bool {
        self.members.iter().any(|p| p.id == provider_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn total_fee(&self) -> f64 {
        self.total_fee
    }

    pub fn unavailable(&self) -> Vec<&Provider> {
        self.members.iter().filter(|p| !p.available).collect()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use shared_models::provider::NewProvider;

    use super::*;

    fn provider(name: &str, fee: f64) -> Provider {
        NewProvider {
            name: name.to_string(),
            speciality: "MRI".to_string(),
            about: String::new(),
            fee,
            image: String::new(),
            address: None,
        }
        .into_provider()
    }

    #[test]
    fn total_fee_tracks_every_mutation() {
        let a = provider("Dr. A", 100.0);
        let b = provider("Dr. B", 150.0);
        let c = provider("Dr. C", 75.5);
        let c_id = c.id;

        let mut selection = ProviderSelection::new(a);
        assert_eq!(selection.total_fee(), 100.0);

        assert_eq!(selection.add(b), SelectionNotice::Added);
        assert_eq!(selection.add(c), SelectionNotice::Added);
        assert_eq!(selection.total_fee(), 325.5);

        selection.remove(c_id).unwrap();
        assert_eq!(selection.total_fee(), 250.0);
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn duplicates_and_unavailable_providers_are_noops() {
        let a = provider("Dr. A", 100.0);
        let mut off = provider("Dr. Off", 90.0);
        off.available = false;

        let mut selection = ProviderSelection::new(a.clone());
        assert_eq!(selection.add(a), SelectionNotice::AlreadySelected);
        assert_eq!(selection.add(off), SelectionNotice::Unavailable);
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.total_fee(), 100.0);
    }

    #[test]
    fn primary_cannot_be_removed() {
        let a = provider("Dr. A", 100.0);
        let a_id = a.id;
        let mut selection = ProviderSelection::new(a);

        assert_matches!(selection.remove(a_id), Err(SelectionError::PrimaryNotRemovable));
        assert_matches!(selection.remove(Uuid::new_v4()), Err(SelectionError::NotSelected(_)));
        assert_eq!(selection.primary().id, a_id);
    }

    #[test]
    fn refresh_updates_fee_and_slots() {
        let a = provider("Dr. A", 100.0);
        let mut updated = a.clone();
        updated.fee = 120.0;
        updated.booked_slots.insert("12/3/2025", "10:00 AM");

        let mut selection = ProviderSelection::new(a);
        assert!(selection.refresh(updated));
        assert_eq!(selection.total_fee(), 120.0);
        assert!(selection.primary().booked_slots.is_booked("12/3/2025", "10:00 AM"));
    }
}
