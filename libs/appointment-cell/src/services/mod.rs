// libs/appointment-cell/src/services/mod.rs
pub mod backend;
pub mod booking;
pub mod client;
pub mod lifecycle;
pub mod orchestrator;
pub mod sweeper;

pub use backend::{BookingBackend, LocalBookingBackend};
pub use booking::BookingService;
pub use client::HttpBookingBackend;
pub use lifecycle::AppointmentLifecycle;
pub use orchestrator::BookingOrchestrator;
