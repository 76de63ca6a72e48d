pub mod appointment;
pub mod auth;
pub mod error;
pub mod intake;
pub mod patient;
pub mod provider;
