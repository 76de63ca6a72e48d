// libs/patient-cell/src/services/mod.rs
pub mod profile;

pub use profile::ProfileService;
