// libs/admin-cell/src/services/dashboard.rs
use shared_models::appointment::Appointment;

use crate::models::{DashboardStats, LATEST_APPOINTMENTS};

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let value = part as f64 * 100.0 / total as f64;
    (value * 100.0).round() / 100.0
}

/// Folds the full appointment list into the admin dashboard figures.
pub fn summarize(providers: usize, patients: usize, mut appointments: Vec<Appointment>) -> DashboardStats {
    let total = appointments.len();
    let completed = appointments.iter().filter(|a| a.completed).count();
    let cancelled = appointments.iter().filter(|a| a.cancelled).count();
    let paid = appointments.iter().filter(|a| a.paid).count();

    appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    appointments.truncate(LATEST_APPOINTMENTS);

    DashboardStats {
        providers,
        appointments: total,
        patients,
        completion_rate: percentage(completed, total),
        cancellation_rate: percentage(cancelled, total),
        payment_rate: percentage(paid, total),
        latest_appointments: appointments,
    }
}
