// libs/appointment-cell/src/services/sweeper.rs
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use shared_utils::AppState;

use crate::services::booking::BookingService;

/// Runs the unpaid-appointment expiry on a fixed interval until the task is
/// aborted.
pub fn spawn_unpaid_sweeper(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.config.unpaid_sweep_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Unpaid appointment sweeper started (every {}s, ttl {} min)",
            period.as_secs(),
            state.config.unpaid_appointment_ttl_minutes
        );

        let booking_service = BookingService::new(&state);
        let mut sweep_interval = interval(period);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            sweep_interval.tick().await;

            match booking_service.expire_unpaid(Utc::now()).await {
                Ok(expired) if expired.is_empty() => debug!("Unpaid sweep found nothing to expire"),
                Ok(expired) => info!("Unpaid sweep expired {} appointments", expired.len()),
                Err(e) => error!("Unpaid sweep failed: {}", e),
            }
        }
    })
}
