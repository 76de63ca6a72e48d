// libs/provider-cell/src/services/mod.rs
pub mod provider;
pub mod selection;
pub mod slots;

pub use provider::{parse_provider_ids, ProviderService};
pub use selection::ProviderSelection;
pub use slots::{generate_slots, SlotHorizon};
