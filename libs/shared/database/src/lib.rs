pub mod error;
pub mod memory;
pub mod normalize;
pub mod postgrest;
pub mod store;
pub mod supabase;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use postgrest::SupabaseStore;
pub use store::{AppointmentFilter, AppointmentPatch, ClinicStore};
