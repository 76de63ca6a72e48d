// libs/admin-cell/src/services/mod.rs
pub mod dashboard;
pub mod panel;

pub use dashboard::summarize;
pub use panel::AdminPanel;
