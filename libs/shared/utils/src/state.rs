use std::sync::Arc;

use tracing::{info, warn};

use shared_config::AppConfig;
use shared_database::{ClinicStore, InMemoryStore, SupabaseStore};
use shared_payments::{InMemoryGateway, PaymentGateway, StripeClient};

/// Shared handler state: configuration plus the persistence and payment
/// collaborators.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ClinicStore>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn ClinicStore>, payments: Arc<dyn PaymentGateway>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            payments,
        }
    }

    /// Picks Supabase and Stripe when configured, in-memory stand-ins otherwise.
    pub fn from_config(config: AppConfig) -> Self {
        let store: Arc<dyn ClinicStore> = if config.is_database_configured() {
            info!("Using Supabase store at {}", config.supabase_url);
            Arc::new(SupabaseStore::new(&config))
        } else {
            warn!("Supabase not configured, using in-memory store");
            Arc::new(InMemoryStore::new())
        };

        let payments: Arc<dyn PaymentGateway> = if config.is_payments_configured() {
            info!("Using Stripe checkout at {}", config.stripe_api_base);
            Arc::new(StripeClient::new(&config))
        } else {
            warn!("Stripe not configured, using in-memory payment gateway");
            Arc::new(InMemoryGateway::new())
        };

        Self::new(config, store, payments)
    }
}
